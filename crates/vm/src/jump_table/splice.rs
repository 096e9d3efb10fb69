//! Splice operations for the Neo Virtual Machine.
//!
//! Byte-level operations on buffers and byte strings. Every result is a
//! fresh [`Buffer`](crate::stack_item::Buffer).

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::{out_of_range, JumpTable};
use crate::op_code::OpCode;
use crate::stack_item::{Buffer, StackItem};

/// Registers the splice operation handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::NEWBUFFER, new_buffer);
    jump_table.register(OpCode::MEMCPY, memcpy);
    jump_table.register(OpCode::CAT, cat);
    jump_table.register(OpCode::SUBSTR, substr);
    jump_table.register(OpCode::LEFT, left);
    jump_table.register(OpCode::RIGHT, right);
}

/// Pops a count or offset that must not be negative.
fn pop_len(engine: &mut ExecutionEngine) -> VmResult<usize> {
    let value = engine.pop_i32()?;
    usize::try_from(value).map_err(|_| out_of_range(value))
}

fn new_buffer(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let length = engine.pop_i32()?;
    engine.limits().assert_max_item_size(i64::from(length))?;
    engine.push(StackItem::Buffer(Buffer::with_len(length as usize)))
}

/// Copies `count` bytes from a source at `si` into a destination buffer at `di`.
fn memcpy(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let count = pop_len(engine)?;
    let si = pop_len(engine)?;
    let src = engine.pop_bytes()?;
    if si + count > src.len() {
        return Err(out_of_range(count));
    }
    let di = pop_len(engine)?;
    let dst = match engine.pop()? {
        StackItem::Buffer(buffer) => buffer,
        other => {
            return Err(VmError::invalid_type_msg(format!(
                "Invalid type for MEMCPY: {}",
                other.stack_item_type()
            )))
        }
    };
    if di + count > dst.len() {
        return Err(out_of_range(count));
    }
    dst.data_mut()[di..di + count].copy_from_slice(&src[si..si + count]);
    Ok(())
}

fn cat(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_bytes()?;
    let mut x1 = engine.pop_bytes()?;
    let length = x1.len() + x2.len();
    engine.limits().assert_max_item_size(length as i64)?;
    x1.extend_from_slice(&x2);
    engine.push(StackItem::from_buffer(x1))
}

fn substr(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let count = pop_len(engine)?;
    let index = pop_len(engine)?;
    let x = engine.pop_bytes()?;
    if index + count > x.len() {
        return Err(out_of_range(count));
    }
    engine.push(StackItem::from_buffer(&x[index..index + count]))
}

fn left(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let count = pop_len(engine)?;
    let x = engine.pop_bytes()?;
    if count > x.len() {
        return Err(out_of_range(count));
    }
    engine.push(StackItem::from_buffer(&x[..count]))
}

fn right(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let count = pop_len(engine)?;
    let x = engine.pop_bytes()?;
    if count > x.len() {
        return Err(out_of_range(count));
    }
    engine.push(StackItem::from_buffer(&x[x.len() - count..]))
}
