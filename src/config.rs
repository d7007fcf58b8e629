//! Runtime configuration, loaded from TOML
//!
//! ```toml
//! [vm]
//! max_stack_depth = 1024
//! random_seed = 7
//!
//! [headless]
//! dialog_choice = 2
//!
//! [[world.entities]]
//! handle = 1
//! name = "Guard"
//! kind = "creature"
//! ```

use crate::error::ConfigError;
use crate::host::{Alignment, EntityKind};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vm: VmConfig,
    pub headless: HeadlessConfig,
    pub world: WorldConfig,
}

/// Limits and switches for the interpreter
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum value stack depth per script
    pub max_stack_depth: usize,
    /// Maximum nested call depth per script
    pub max_call_depth: usize,
    /// Instructions a script may run per slice before yielding
    pub instruction_budget: usize,
    /// Log every executed instruction at info level
    pub trace: bool,
    /// Seed for the script RNG; unseeded uses the thread RNG
    pub random_seed: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_stack_depth: 1024,
            max_call_depth: 256,
            instruction_budget: 10_000,
            trace: false,
            random_seed: None,
        }
    }
}

/// Behaviour of the built-in headless engine
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeadlessConfig {
    /// Simulated seconds per tick
    pub tick_seconds: f32,
    /// Give up after this many ticks
    pub max_ticks: usize,
    /// Option automatically chosen when a dialog opens
    pub dialog_choice: f32,
    /// Walking speed in world units per second
    pub move_speed: f32,
    /// How long a spoken line lasts
    pub speech_seconds: f32,
    /// Action points one attack costs
    pub attack_cost: i32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        HeadlessConfig {
            tick_seconds: 0.1,
            max_ticks: 10_000,
            dialog_choice: 1.0,
            move_speed: 4.0,
            speech_seconds: 2.0,
            attack_cost: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub entities: Vec<EntitySpec>,
}

/// Initial state of one headless world entity
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EntitySpec {
    pub handle: u16,
    pub name: String,
    pub kind: EntityKind,
    pub hit_points: i32,
    pub x: f32,
    pub y: f32,
    pub alignment: Alignment,
    pub action_points: i32,
    pub open: bool,
}

impl Default for EntitySpec {
    fn default() -> Self {
        EntitySpec {
            handle: 0,
            name: String::new(),
            kind: EntityKind::Scenery,
            hit_points: 10,
            x: 0.0,
            y: 0.0,
            alignment: Alignment::Neutral,
            action_points: 6,
            open: false,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
