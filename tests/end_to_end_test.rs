//! End-to-end tests driving the public API: assemble or load a code unit,
//! run it against the headless engine through the game loop, and inspect
//! the results.

use grimoire::assembler::assemble;
use grimoire::bytecode::CodeUnit;
use grimoire::config::Config;
use grimoire::error::{DecodeError, ScriptError};
use grimoire::host::{GuiManager, InterfaceState, World};
use grimoire::host_headless::HeadlessEngine;
use grimoire::interpreter::Interpreter;
use grimoire::script::ScriptState;
use grimoire::value::{EntityHandle, StackValue};
use std::rc::Rc;
use test_log::test;

const WORLD: &str = r#"
[vm]
random_seed = 11

[headless]
tick_seconds = 0.5
dialog_choice = 2

[[world.entities]]
handle = 1
name = "Guard"
kind = "creature"
x = 0.0
y = 0.0

[[world.entities]]
handle = 7
name = "Gate"
kind = "wall"
open = false
"#;

fn create_interpreter(config: &Config) -> Interpreter<HeadlessEngine> {
    let engine = HeadlessEngine::new(config.headless.clone(), &config.world);
    Interpreter::new(engine, config.vm.clone())
}

/// Run the headless game loop until every script has finished
fn run_to_completion(interp: &mut Interpreter<HeadlessEngine>, tick_seconds: f32) -> usize {
    let mut ticks = 0;
    interp.tick();
    while !interp.all_finished() && ticks < 1000 {
        interp.engine_mut().advance(tick_seconds);
        interp.tick();
        ticks += 1;
    }
    ticks
}

#[test]
fn test_total_from_container_bytes() {
    let unit = assemble(
        r#"
        push 3.0
        push 4.0
        add
        num2str
        push "Total: "
        concat
        "#,
    )
    .unwrap();
    let bytes = unit.to_bytes();
    assert_eq!(&bytes[..4], b"GRIM");

    let loaded = CodeUnit::from_bytes(&bytes).unwrap();
    assert_eq!(loaded.instructions.len(), 6);

    let config = Config::default();
    let mut interp = create_interpreter(&config);
    let id = interp.spawn(Rc::new(loaded), None);
    assert_eq!(interp.run(id), Some(ScriptState::Stopped));
    let stack = interp.script(id).unwrap().stack().to_vec();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack[0].as_str().unwrap(), "Total: 7");
}

#[test]
fn test_truncated_container_is_rejected() {
    let bytes = assemble("push 1\nprint").unwrap().to_bytes();
    let truncated = &bytes[..bytes.len() - 2];
    assert!(matches!(
        CodeUnit::from_bytes(truncated),
        Err(DecodeError::Underrun { .. })
    ));
}

#[test]
fn test_gatekeeper_scene() {
    let config = Config::from_toml_str(WORLD).unwrap();
    let mut interp = create_interpreter(&config);
    let unit = assemble(
        r#"
        .slots 1
            push "Open the gate?"
            dialog              ; answered with 2 by the headless engine
            store $0
            push 2
            load $0
            jne refuse
            push 1              ; wait for the walk
            push 0
            push 3
            self
            move_to
            push 1
            push #7
            set_wall_open
            push "The gate swings open."
            print
            ret
        refuse:
            push "The guard shrugs."
            print
        "#,
    )
    .unwrap();
    let id = interp.spawn(Rc::new(unit), Some(EntityHandle(1)));

    let ticks = run_to_completion(&mut interp, config.headless.tick_seconds);
    assert!(ticks > 1);
    assert_eq!(interp.state(id), Some(&ScriptState::Stopped));

    let engine = interp.engine();
    assert_eq!(engine.wall_is_open(EntityHandle(7)), Some(true));
    assert_eq!(engine.position(EntityHandle(1)), Some((3.0, 0.0)));
    assert_eq!(engine.interface_state(), InterfaceState::Main);
    assert_eq!(
        engine.output().last().map(String::as_str),
        Some("The gate swings open.")
    );
    assert_eq!(interp.reap_finished(), 1);
}

#[test]
fn test_wrong_interface_state_interrupts_immediately() {
    let config = Config::from_toml_str(WORLD).unwrap();
    let mut interp = create_interpreter(&config);
    interp.engine_mut().set_interface_state(InterfaceState::Menu);
    let unit = assemble("push \"Open the gate?\"\ndialog\npush \"unreachable\"").unwrap();
    let id = interp.spawn(Rc::new(unit), None);

    let state = interp.run(id);
    assert!(matches!(
        state,
        Some(ScriptState::Interrupted(ScriptError::Disallowed(_)))
    ));
    assert!(interp.bridge().is_empty());
    assert_eq!(interp.engine().open_dialogs(), 0);
    assert!(interp.engine().output().is_empty());
    assert_eq!(interp.script(id).unwrap().stack(), &[] as &[StackValue]);
}

#[test]
fn test_scripts_interleave_across_pauses() {
    let config = Config::from_toml_str(WORLD).unwrap();
    let mut interp = create_interpreter(&config);
    let slow = assemble("push 1.2\nwait\npush \"slow\"\nprint").unwrap();
    let fast = assemble("push 0.4\nwait\npush \"fast\"\nprint").unwrap();
    interp.spawn(Rc::new(slow), None);
    interp.spawn(Rc::new(fast), None);

    run_to_completion(&mut interp, config.headless.tick_seconds);
    assert_eq!(
        interp.engine().output(),
        &["fast".to_string(), "slow".to_string()]
    );
}
