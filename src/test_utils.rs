// Test utilities for building worlds and running assembled scripts
use crate::assembler::assemble;
use crate::config::{EntitySpec, HeadlessConfig, VmConfig, WorldConfig};
use crate::host::EntityKind;
use crate::host_headless::HeadlessEngine;
use crate::interpreter::Interpreter;
use crate::script::{ScriptId, ScriptState};
use crate::value::{EntityHandle, StackValue};
use std::rc::Rc;

pub const GUARD: EntityHandle = EntityHandle(1);
pub const RAT: EntityHandle = EntityHandle(2);
pub const DOOR: EntityHandle = EntityHandle(3);
pub const SWORD: EntityHandle = EntityHandle(4);

/// A guard, a rat, a closed door and a sword
pub fn create_test_world() -> WorldConfig {
    WorldConfig {
        entities: vec![
            EntitySpec {
                handle: GUARD.0,
                name: "Guard".to_string(),
                kind: EntityKind::Creature,
                hit_points: 12,
                ..EntitySpec::default()
            },
            EntitySpec {
                handle: RAT.0,
                name: "Rat".to_string(),
                kind: EntityKind::Creature,
                hit_points: 2,
                x: 3.0,
                y: 4.0,
                ..EntitySpec::default()
            },
            EntitySpec {
                handle: DOOR.0,
                name: "Door".to_string(),
                kind: EntityKind::Wall,
                ..EntitySpec::default()
            },
            EntitySpec {
                handle: SWORD.0,
                name: "Sword".to_string(),
                kind: EntityKind::Item,
                ..EntitySpec::default()
            },
        ],
    }
}

pub fn create_test_interpreter() -> Interpreter<HeadlessEngine> {
    let engine = HeadlessEngine::new(HeadlessConfig::default(), &create_test_world());
    let config = VmConfig {
        random_seed: Some(42),
        ..VmConfig::default()
    };
    Interpreter::new(engine, config)
}

/// Assemble `source` and spawn it, owned by `owner`
pub fn spawn_source(
    interp: &mut Interpreter<HeadlessEngine>,
    source: &str,
    owner: Option<EntityHandle>,
) -> ScriptId {
    let unit = assemble(source).unwrap_or_else(|e| panic!("assembly failed: {}", e));
    interp.spawn(Rc::new(unit), owner)
}

/// Assemble and run a script owned by the guard until it first stops,
/// pauses or interrupts
pub fn run_source(source: &str) -> (Interpreter<HeadlessEngine>, ScriptId) {
    let mut interp = create_test_interpreter();
    let id = spawn_source(&mut interp, source, Some(GUARD));
    interp.run(id);
    (interp, id)
}

pub fn stack_of(interp: &Interpreter<HeadlessEngine>, id: ScriptId) -> Vec<StackValue> {
    interp
        .script(id)
        .map(|s| s.stack().to_vec())
        .unwrap_or_default()
}

pub fn state_of(interp: &Interpreter<HeadlessEngine>, id: ScriptId) -> ScriptState {
    interp.state(id).cloned().unwrap_or(ScriptState::Stopped)
}

/// Advance the headless engine and deliver its notifications
pub fn advance(interp: &mut Interpreter<HeadlessEngine>, dt: f32) {
    interp.engine_mut().advance(dt);
    interp.tick();
}
