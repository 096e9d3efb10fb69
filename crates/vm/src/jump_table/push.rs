//! Push operations for the Neo Virtual Machine.
//!
//! This module provides the push operation handlers for the Neo VM.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::{offset_position, JumpTable};
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use num_bigint::BigInt;

/// Registers the push operation handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    for opcode in [
        OpCode::PUSHINT8,
        OpCode::PUSHINT16,
        OpCode::PUSHINT32,
        OpCode::PUSHINT64,
        OpCode::PUSHINT128,
        OpCode::PUSHINT256,
    ] {
        jump_table.register(opcode, push_int);
    }
    jump_table.register(OpCode::PUSHT, push_t);
    jump_table.register(OpCode::PUSHF, push_f);
    jump_table.register(OpCode::PUSHA, push_a);
    jump_table.register(OpCode::PUSHNULL, push_null);
    jump_table.register(OpCode::PUSHDATA1, push_data);
    jump_table.register(OpCode::PUSHDATA2, push_data);
    jump_table.register(OpCode::PUSHDATA4, push_data);
    jump_table.register(OpCode::PUSHM1, push_small_int);
    for byte in OpCode::PUSH0.byte()..=OpCode::PUSH16.byte() {
        if let Some(opcode) = OpCode::from_byte(byte) {
            jump_table.register(opcode, push_small_int);
        }
    }
}

/// Implements PUSHINT8 through PUSHINT256. The operand is a little-endian
/// two's-complement integer of the opcode's width.
fn push_int(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let value = BigInt::from_signed_bytes_le(instruction.operand());
    engine.push(StackItem::Integer(value))
}

fn push_t(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    engine.push_bool(true)
}

fn push_f(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    engine.push_bool(false)
}

/// Implements the PUSHA operation.
fn push_a(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let context = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation_msg("No current context"))?;
    let position = offset_position(context.instruction_pointer(), instruction.token_i32());
    if position < 0 || position > context.script().len() as i64 {
        return Err(VmError::invalid_operation_msg(format!(
            "Bad pointer address(Instruction instruction) {position}"
        )));
    }
    let pointer = StackItem::from_pointer(context.script().clone(), position as usize);
    engine.push(pointer)
}

fn push_null(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    engine.push(StackItem::Null)
}

/// Implements PUSHDATA1, PUSHDATA2 and PUSHDATA4.
fn push_data(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let data = instruction.operand();
    engine.limits().assert_max_item_size(data.len() as i64)?;
    engine.push(StackItem::from_byte_string(data.to_vec()))
}

/// Implements PUSHM1 and PUSH0 through PUSH16.
fn push_small_int(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let value = i32::from(instruction.opcode().byte()) - i32::from(OpCode::PUSH0.byte());
    engine.push(StackItem::from_int(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::vm_state::VMState;

    fn run(bytes: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(None);
        engine.load_script(Script::new(bytes), -1, 0).unwrap();
        engine.execute();
        engine
    }

    fn result_ints(engine: &ExecutionEngine) -> Vec<BigInt> {
        engine
            .result_stack()
            .as_slice()
            .iter()
            .map(|item| item.as_int().unwrap())
            .collect()
    }

    #[test]
    fn test_push_small_ints() {
        let engine = run(vec![
            OpCode::PUSHM1 as u8,
            OpCode::PUSH0 as u8,
            OpCode::PUSH16 as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            result_ints(&engine),
            vec![BigInt::from(-1), BigInt::from(0), BigInt::from(16)]
        );
    }

    #[test]
    fn test_push_int_operands() {
        let engine = run(vec![
            OpCode::PUSHINT8 as u8,
            0xFF,
            OpCode::PUSHINT16 as u8,
            0x00,
            0x01,
            OpCode::PUSHINT32 as u8,
            0xFE,
            0xFF,
            0xFF,
            0xFF,
        ]);
        assert_eq!(
            result_ints(&engine),
            vec![BigInt::from(-1), BigInt::from(256), BigInt::from(-2)]
        );
    }

    #[test]
    fn test_push_data_and_null() {
        let engine = run(vec![
            OpCode::PUSHDATA1 as u8,
            3,
            b'a',
            b'b',
            b'c',
            OpCode::PUSHNULL as u8,
            OpCode::PUSHT as u8,
        ]);
        let items = engine.result_stack().as_slice();
        assert_eq!(items[0].as_bytes().unwrap(), b"abc".to_vec());
        assert!(items[1].is_null());
        assert!(items[2].as_bool().unwrap());
    }

    #[test]
    fn test_push_a_bounds() {
        let engine = run(vec![OpCode::PUSHA as u8, 5, 0, 0, 0]);
        assert_eq!(engine.state(), VMState::HALT);
        match &engine.result_stack().as_slice()[0] {
            StackItem::Pointer(pointer) => assert_eq!(pointer.position(), 5),
            other => panic!("unexpected item {other:?}"),
        }

        let engine = run(vec![OpCode::PUSHA as u8, 6, 0, 0, 0]);
        assert_eq!(engine.state(), VMState::FAULT);
        let engine = run(vec![OpCode::PUSHA as u8, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(engine.state(), VMState::FAULT);
    }
}
