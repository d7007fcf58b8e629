// Jump and comparison-jump tests
use crate::error::ScriptError;
use crate::script::ScriptState;
use crate::test_utils::*;
use crate::value::StackValue;
use test_log::test;

/// Run `setup` followed by `jump`, reporting whether the branch was taken
fn branch_taken(setup: &str, jump: &str) -> bool {
    let source = format!(
        "{setup}\n{jump} taken\npush \"fell\"\nret\ntaken:\npush \"took\"\n"
    );
    let (interp, id) = run_source(&source);
    assert_eq!(state_of(&interp, id), ScriptState::Stopped, "{}", source);
    let stack = stack_of(&interp, id);
    assert_eq!(stack.len(), 1, "{}", source);
    match stack[0].as_str().unwrap() {
        "took" => true,
        "fell" => false,
        other => panic!("unexpected {}", other),
    }
}

#[test]
fn test_unconditional_jump() {
    assert!(branch_taken("nop", "jmp"));
}

#[test]
fn test_jump_if_false_boundary() {
    assert!(branch_taken("push 0", "jf"));
    assert!(branch_taken("push 0.99", "jf"));
    assert!(branch_taken("push -3", "jf"));
    assert!(!branch_taken("push 1", "jf"));
    assert!(!branch_taken("push 7", "jf"));
}

#[test]
fn test_jump_if_true_boundary() {
    assert!(branch_taken("push 1", "jt"));
    assert!(branch_taken("push 1.5", "jt"));
    assert!(!branch_taken("push 0.99", "jt"));
    assert!(!branch_taken("push 0", "jt"));
}

#[test]
fn test_ordering_jumps_use_first_popped_as_left() {
    // first popped = 3, second = 2
    assert!(branch_taken("push 2\npush 3", "jge"));
    assert!(branch_taken("push 2\npush 3", "jgt"));
    assert!(!branch_taken("push 2\npush 3", "jlt"));
    assert!(!branch_taken("push 2\npush 3", "jle"));
    // equal operands
    assert!(branch_taken("push 2\npush 2", "jge"));
    assert!(!branch_taken("push 2\npush 2", "jgt"));
    assert!(branch_taken("push 2\npush 2", "jle"));
}

#[test]
fn test_equality_jumps() {
    assert!(branch_taken("push 4\npush 4", "jeq"));
    assert!(!branch_taken("push 4\npush 5", "jeq"));
    assert!(branch_taken("push 4\npush 5", "jne"));
    assert!(branch_taken("push \"Door\"\npush \"DOOR\"", "jstr_eq"));
    assert!(!branch_taken("push \"Door\"\npush \"DOOR\"", "jstr_ne"));
    assert!(branch_taken("push #3\npush #3", "jent_eq"));
    assert!(branch_taken("push #3\npush #4", "jent_ne"));
}

#[test]
fn test_equality_jump_kind_mismatch_interrupts() {
    let (interp, id) = run_source("push \"4\"\npush \"4\"\njeq end\nend:");
    assert!(matches!(
        state_of(&interp, id),
        ScriptState::Interrupted(ScriptError::TypeMismatch { .. })
    ));
}

#[test]
fn test_counting_loop() {
    let (interp, id) = run_source(
        r#"
        .slots 1
        loop:
            load $0
            push 1
            add
            store $0
            push 5
            load $0
            jlt loop        ; while counter < 5
            load $0
        "#,
    );
    assert_eq!(state_of(&interp, id), ScriptState::Stopped);
    assert_eq!(stack_of(&interp, id), vec![StackValue::Number(5.0)]);
}

#[test]
fn test_jump_to_end_stops() {
    let (interp, id) = run_source("jmp end\npush 1\nend:");
    assert_eq!(state_of(&interp, id), ScriptState::Stopped);
    assert!(stack_of(&interp, id).is_empty());
}
