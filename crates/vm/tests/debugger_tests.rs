//! Integration tests for breakpoints and stepping.

use neovm_engine::op_code::OpCode;
use neovm_engine::{Debugger, ExecutionEngine, Script, ScriptBuilder, VMState};
use num_bigint::BigInt;

/// 0: PUSH1; 1: CALL +4; 3: PUSH3; 4: RET; 5: PUSH2; 6: RET
fn call_script() -> Script {
    Script::new(vec![
        OpCode::PUSH1 as u8,
        OpCode::CALL as u8,
        4,
        OpCode::PUSH3 as u8,
        OpCode::RET as u8,
        OpCode::PUSH2 as u8,
        OpCode::RET as u8,
    ])
}

fn debugger_for(script: &Script) -> Debugger {
    let mut engine = ExecutionEngine::new(None);
    engine.load_script(script.clone(), -1, 0).unwrap();
    Debugger::new(engine)
}

fn result_ints(debugger: &Debugger) -> Vec<BigInt> {
    debugger
        .engine()
        .result_stack()
        .as_slice()
        .iter()
        .map(|item| item.as_int().unwrap())
        .collect()
}

fn current_position(debugger: &Debugger) -> usize {
    debugger
        .engine()
        .current_context()
        .unwrap()
        .instruction_pointer()
}

#[test]
fn test_breakpoint_inside_called_frame() {
    let script = call_script();
    let mut debugger = debugger_for(&script);
    debugger.add_breakpoint(&script, 5);

    assert_eq!(debugger.execute(), VMState::BREAK);
    assert_eq!(debugger.engine().invocation_stack().len(), 2);
    assert_eq!(current_position(&debugger), 5);

    assert_eq!(debugger.step_over(), VMState::BREAK);
    assert_eq!(current_position(&debugger), 6);

    assert_eq!(debugger.step_out(), VMState::BREAK);
    assert_eq!(debugger.engine().invocation_stack().len(), 1);
    assert_eq!(current_position(&debugger), 3);

    assert_eq!(debugger.execute(), VMState::HALT);
    assert_eq!(
        result_ints(&debugger),
        vec![BigInt::from(1), BigInt::from(2), BigInt::from(3)]
    );
}

#[test]
fn test_step_into_and_over_calls() {
    let script = call_script();

    let mut debugger = debugger_for(&script);
    debugger.step_into();
    assert_eq!(debugger.step_into(), VMState::BREAK);
    assert_eq!(debugger.engine().invocation_stack().len(), 2);

    let mut debugger = debugger_for(&script);
    debugger.step_into();
    assert_eq!(debugger.step_over(), VMState::BREAK);
    assert_eq!(debugger.engine().invocation_stack().len(), 1);
    assert_eq!(current_position(&debugger), 3);
}

#[test]
fn test_breakpoints_match_script_identity() {
    let script = call_script();
    let mut debugger = debugger_for(&script);
    // Same bytes, different script.
    debugger.add_breakpoint(&call_script(), 5);

    assert_eq!(debugger.execute(), VMState::HALT);
}

#[test]
fn test_removed_breakpoint_is_not_hit() {
    let script = call_script();
    let mut debugger = debugger_for(&script);
    debugger.add_breakpoint(&script, 3);

    assert!(debugger.remove_breakpoint(&script, 3));
    assert!(!debugger.remove_breakpoint(&script, 3));
    assert_eq!(debugger.execute(), VMState::HALT);
}

#[test]
fn test_stepping_to_completion() {
    let mut builder = ScriptBuilder::new();
    builder
        .emit_push_int(40)
        .emit_push_int(2)
        .emit(OpCode::ADD);
    let script = builder.to_script();
    let mut debugger = debugger_for(&script);

    let mut steps = 0;
    while debugger.step_over() == VMState::BREAK {
        steps += 1;
    }

    // PUSHINT8, PUSH2, ADD and the implicit RET each pause once.
    assert_eq!(steps, 4);
    assert_eq!(debugger.engine().state(), VMState::HALT);
    assert_eq!(result_ints(&debugger), vec![BigInt::from(42)]);
}
