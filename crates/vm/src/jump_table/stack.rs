//! Stack operations for the Neo Virtual Machine.
//!
//! This module provides the stack manipulation handlers for the Neo VM.
//! Indices taken from the stack count from the top, starting at zero.

use crate::error::{VmError, VmResult};
use crate::evaluation_stack::EvaluationStack;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::{non_negative, JumpTable};
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use std::cell::RefMut;

/// Registers the stack operation handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::DEPTH, depth);
    jump_table.register(OpCode::DROP, drop_top);
    jump_table.register(OpCode::NIP, nip);
    jump_table.register(OpCode::XDROP, xdrop);
    jump_table.register(OpCode::CLEAR, clear);
    jump_table.register(OpCode::DUP, dup);
    jump_table.register(OpCode::OVER, over);
    jump_table.register(OpCode::PICK, pick);
    jump_table.register(OpCode::TUCK, tuck);
    jump_table.register(OpCode::SWAP, swap);
    jump_table.register(OpCode::ROT, rot);
    jump_table.register(OpCode::ROLL, roll);
    jump_table.register(OpCode::REVERSE3, reverse3);
    jump_table.register(OpCode::REVERSE4, reverse4);
    jump_table.register(OpCode::REVERSEN, reversen);
}

fn stack(engine: &ExecutionEngine) -> VmResult<RefMut<'_, EvaluationStack>> {
    engine
        .current_context()
        .map(|context| context.evaluation_stack_mut())
        .ok_or_else(|| VmError::invalid_operation_msg("No current context"))
}

fn depth(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let depth = stack(engine)?.len();
    engine.push(StackItem::from_int(depth as i64))
}

fn drop_top(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    engine.pop()?;
    Ok(())
}

fn nip(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    stack(engine)?.remove(1)?;
    Ok(())
}

fn xdrop(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let n = non_negative(engine.pop_i32()?, OpCode::XDROP)?;
    stack(engine)?.remove(n as isize)?;
    Ok(())
}

fn clear(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    stack(engine)?.clear();
    Ok(())
}

fn dup(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.peek(0)?;
    engine.push(item)
}

fn over(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let item = engine.peek(1)?;
    engine.push(item)
}

fn pick(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let n = non_negative(engine.pop_i32()?, OpCode::PICK)?;
    let item = engine.peek(n as isize)?;
    engine.push(item)
}

/// Copies the top item below the second one.
fn tuck(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let mut stack = stack(engine)?;
    let item = stack.peek(0)?.clone();
    stack.insert(2, item)
}

fn swap(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let mut stack = stack(engine)?;
    let item = stack.remove(1)?;
    stack.push(item);
    Ok(())
}

fn rot(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let mut stack = stack(engine)?;
    let item = stack.remove(2)?;
    stack.push(item);
    Ok(())
}

fn roll(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let n = non_negative(engine.pop_i32()?, OpCode::ROLL)?;
    if n == 0 {
        return Ok(());
    }
    let mut stack = stack(engine)?;
    let item = stack.remove(n as isize)?;
    stack.push(item);
    Ok(())
}

fn reverse3(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    stack(engine)?.reverse(3)
}

fn reverse4(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    stack(engine)?.reverse(4)
}

fn reversen(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let n = non_negative(engine.pop_i32()?, OpCode::REVERSEN)?;
    stack(engine)?.reverse(n)
}
