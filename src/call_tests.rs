// Call and return tests
use crate::error::ScriptError;
use crate::interpreter::ExecutionResult;
use crate::script::ScriptState;
use crate::test_utils::*;
use crate::value::StackValue;
use test_log::test;

const CALL_AND_RETURN: &str = r#"
    push 1
    call sub
    push 3
    ret
sub:
    push 2
    ret
"#;

#[test]
fn test_return_resumes_after_call_site() {
    let (interp, id) = run_source(CALL_AND_RETURN);
    assert_eq!(state_of(&interp, id), ScriptState::Stopped);
    assert_eq!(
        stack_of(&interp, id),
        vec![
            StackValue::Number(1.0),
            StackValue::Number(2.0),
            StackValue::Number(3.0)
        ]
    );
}

#[test]
fn test_call_frame_bookkeeping_step_by_step() {
    let mut interp = create_test_interpreter();
    let id = spawn_source(&mut interp, CALL_AND_RETURN, Some(GUARD));

    assert_eq!(interp.step(id), Some(ExecutionResult::Continue));
    assert_eq!(interp.step(id), Some(ExecutionResult::Called));
    let script = interp.script(id).unwrap();
    assert_eq!(script.frame_depth(), 1);
    assert_eq!(script.code_pos(), 4);

    assert_eq!(interp.step(id), Some(ExecutionResult::Continue));
    assert_eq!(interp.step(id), Some(ExecutionResult::Returned));
    let script = interp.script(id).unwrap();
    assert_eq!(script.frame_depth(), 0);
    assert_eq!(script.code_pos(), 2);

    assert_eq!(interp.step(id), Some(ExecutionResult::Continue));
    assert_eq!(interp.step(id), Some(ExecutionResult::Stopped));
    assert_eq!(interp.step(id), None);
}

#[test]
fn test_global_script_return_stops() {
    let mut interp = create_test_interpreter();
    let id = spawn_source(&mut interp, "ret\npush 1", None);
    assert!(interp.script(id).unwrap().is_global_script());
    interp.run(id);
    assert_eq!(state_of(&interp, id), ScriptState::Stopped);
    assert!(stack_of(&interp, id).is_empty());
}

#[test]
fn test_return_inside_global_call_stops_script() {
    let mut interp = create_test_interpreter();
    let id = spawn_source(&mut interp, "call sub\npush 1\nret\nsub:\npush 9\nret", None);
    interp.run(id);
    assert_eq!(state_of(&interp, id), ScriptState::Stopped);
    assert_eq!(stack_of(&interp, id), vec![StackValue::Number(9.0)]);
}

#[test]
fn test_unbounded_recursion_hits_depth_limit() {
    let (interp, id) = run_source("again:\ncall again");
    assert_eq!(
        state_of(&interp, id),
        ScriptState::Interrupted(ScriptError::CallDepthExceeded(256))
    );
}

#[test]
fn test_slots_are_shared_across_call_depths() {
    let (interp, id) = run_source(
        r#"
        .slots 1
            push 1
            store $0
            call sub
            load $0
            ret
        sub:
            push 7
            store $0
            ret
        "#,
    );
    assert_eq!(stack_of(&interp, id), vec![StackValue::Number(7.0)]);
}
