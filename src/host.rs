//! Engine subsystems reachable from API instructions
//!
//! The VM never owns the world. It talks to it through these traits, the
//! same way the interpreter talks to a display: one trait per subsystem,
//! bundled into `Engine`. Asynchronous requests carry an optional
//! `WaitToken`; when present, the engine later reports the outcome as an
//! `EngineEvent` carrying that token.

use crate::suspension::WaitToken;
use crate::value::{EntityHandle, StackValue};

/// Kinds of world entity the API distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Creature,
    Wall,
    Item,
    Scenery,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Creature => "creature",
            EntityKind::Wall => "wall",
            EntityKind::Item => "item",
            EntityKind::Scenery => "scenery",
        }
    }
}

/// Equipment slots, encoded on the stack as Numbers 0-5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipSlot {
    Head,
    Body,
    LeftHand,
    RightHand,
    Feet,
    Ring,
}

impl EquipSlot {
    pub const COUNT: usize = 6;

    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(EquipSlot::Head),
            1 => Some(EquipSlot::Body),
            2 => Some(EquipSlot::LeftHand),
            3 => Some(EquipSlot::RightHand),
            4 => Some(EquipSlot::Feet),
            5 => Some(EquipSlot::Ring),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Creature alignment, encoded as Numbers 0-2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Lawful,
    #[default]
    Neutral,
    Chaotic,
}

impl Alignment {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Alignment::Lawful),
            1 => Some(Alignment::Neutral),
            2 => Some(Alignment::Chaotic),
            _ => None,
        }
    }

    pub fn index(&self) -> u32 {
        *self as u32
    }
}

/// Which top-level GUI state the game is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceState {
    #[default]
    Main,
    Inventory,
    Dialog,
    WorldMap,
    Menu,
}

impl InterfaceState {
    pub fn index(&self) -> u32 {
        *self as u32
    }
}

/// Notifications flowing from the engine back to the VM
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// An alarm set with `AlarmClock::set_alarm` elapsed
    AlarmFired(WaitToken),
    /// A notifying command (move, speak, attack) finished
    CommandFinished {
        token: WaitToken,
        result: Option<StackValue>,
    },
    /// A notifying command was superseded or could not be completed
    CommandDisqualified { token: WaitToken, reason: String },
    /// A notifying window (dialog, fade) closed
    WindowClosed {
        token: WaitToken,
        result: Option<StackValue>,
    },
    /// An entity left the world
    EntityDestroyed(EntityHandle),
    /// World time was paused or unpaused
    WorldPaused(bool),
}

pub trait World {
    fn entity_kind(&self, entity: EntityHandle) -> Option<EntityKind>;

    fn entity_exists(&self, entity: EntityHandle) -> bool {
        self.entity_kind(entity).is_some()
    }

    fn entity_name(&self, entity: EntityHandle) -> Option<String>;

    fn position(&self, entity: EntityHandle) -> Option<(f32, f32)>;

    fn hit_points(&self, creature: EntityHandle) -> Option<i32>;

    fn set_hit_points(&mut self, creature: EntityHandle, hit_points: i32);

    fn wall_is_open(&self, wall: EntityHandle) -> Option<bool>;

    fn set_wall_open(&mut self, wall: EntityHandle, open: bool);

    /// Item in a creature's slot; `None` if the creature is unknown,
    /// `Some(NULL)` for an empty slot
    fn equipped_item(&self, creature: EntityHandle, slot: EquipSlot) -> Option<EntityHandle>;

    fn alignment(&self, creature: EntityHandle) -> Option<Alignment>;

    fn set_alignment(&mut self, creature: EntityHandle, alignment: Alignment);

    fn destroy_entity(&mut self, entity: EntityHandle);

    /// Start walking a creature towards a point. A previous notifying
    /// command for the same creature is disqualified.
    fn issue_move(&mut self, creature: EntityHandle, target: (f32, f32), notify: Option<WaitToken>);

    /// Start an entity speaking a line
    fn issue_speech(&mut self, entity: EntityHandle, text: &str, notify: Option<WaitToken>);
}

pub trait CombatSystem {
    fn in_combat(&self) -> bool;

    fn start_combat(&mut self);

    fn end_combat(&mut self);

    fn action_points(&self, creature: EntityHandle) -> Option<i32>;

    /// Action points one attack costs
    fn attack_cost(&self) -> i32;

    fn issue_attack(&mut self, attacker: EntityHandle, target: EntityHandle, notify: Option<WaitToken>);
}

pub trait GuiManager {
    fn interface_state(&self) -> InterfaceState;

    /// Append a line to the message log
    fn print(&mut self, text: &str);

    /// Floating message; only shown from the main interface
    fn show_message(&mut self, text: &str);

    fn open_dialog(&mut self, text: &str, notify: Option<WaitToken>);

    fn fade(&mut self, fade_in: bool, seconds: f32, notify: Option<WaitToken>);
}

pub trait AlarmClock {
    fn set_alarm(&mut self, token: WaitToken, seconds: f32);

    fn cancel_alarm(&mut self, token: WaitToken);
}

/// Everything the VM needs from the game engine
pub trait Engine: World + CombatSystem + GuiManager + AlarmClock {
    /// Take all notifications produced since the last call
    fn drain_events(&mut self) -> Vec<EngineEvent>;

    /// Stop reporting on a notifying request. Used when a waiting script is
    /// torn down; the request itself may still run to completion.
    fn forget_notification(&mut self, token: WaitToken);
}
