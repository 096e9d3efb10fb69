//! Slot operations for the Neo Virtual Machine.
//!
//! Static fields, local variables and arguments are each held in a
//! [`Slot`]. The numbered forms (`LDLOC0` .. `LDLOC6` and friends) encode the
//! index in the opcode; the plain forms take it from a one-byte operand.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::slot::Slot;
use crate::stack_item::StackItem;

#[derive(Debug, Clone, Copy)]
enum SlotKind {
    Static,
    Local,
    Argument,
}

/// Registers the slot operation handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::INITSSLOT, init_s_slot);
    jump_table.register(OpCode::INITSLOT, init_slot);

    register_range(jump_table, OpCode::LDSFLD0, OpCode::LDSFLD, ld_s_fld);
    register_range(jump_table, OpCode::STSFLD0, OpCode::STSFLD, st_s_fld);
    register_range(jump_table, OpCode::LDLOC0, OpCode::LDLOC, ld_loc);
    register_range(jump_table, OpCode::STLOC0, OpCode::STLOC, st_loc);
    register_range(jump_table, OpCode::LDARG0, OpCode::LDARG, ld_arg);
    register_range(jump_table, OpCode::STARG0, OpCode::STARG, st_arg);
}

fn register_range(
    jump_table: &mut JumpTable,
    first: OpCode,
    last: OpCode,
    handler: crate::jump_table::InstructionHandler,
) {
    for byte in first.byte()..=last.byte() {
        if let Some(opcode) = OpCode::from_byte(byte) {
            jump_table.register(opcode, handler);
        }
    }
}

/// The slot index of a load or store. `first` is the `0` form of the group.
fn slot_index(instruction: &Instruction, first: OpCode) -> usize {
    let offset = instruction.opcode().byte() - first.byte();
    if offset < 7 {
        usize::from(offset)
    } else {
        usize::from(instruction.token_u8())
    }
}

fn no_context() -> VmError {
    VmError::invalid_operation_msg("No current context")
}

fn not_initialized() -> VmError {
    VmError::invalid_operation_msg("Slot has not been initialized.")
}

fn init_s_slot(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let reference_counter = engine.reference_counter().clone();
    let context = engine.current_context().ok_or_else(no_context)?;
    let mut static_fields = context.static_fields_mut();
    if static_fields.is_some() {
        return Err(VmError::invalid_operation_msg(
            "INITSSLOT cannot be executed twice.",
        ));
    }
    let count = instruction.token_u8();
    if count == 0 {
        return Err(VmError::invalid_operation_msg(format!(
            "The operand {count} is invalid for OpCode.INITSSLOT."
        )));
    }
    *static_fields = Some(Slot::with_count(usize::from(count), reference_counter));
    Ok(())
}

/// Creates the local variable slot and moves arguments off the stack.
/// The first popped item becomes argument 0.
fn init_slot(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let context = engine.current_context().ok_or_else(no_context)?;
    if context.local_variables().is_some() || context.arguments().is_some() {
        return Err(VmError::invalid_operation_msg(
            "INITSLOT cannot be executed twice.",
        ));
    }
    if instruction.token_u16() == 0 {
        return Err(VmError::invalid_operation_msg(format!(
            "The operand {} is invalid for OpCode.INITSLOT.",
            instruction.token_u16()
        )));
    }

    let reference_counter = engine.reference_counter().clone();
    let local_count = usize::from(instruction.token_u8());
    let argument_count = usize::from(instruction.token_u8_1());

    let mut arguments = Vec::with_capacity(argument_count);
    for _ in 0..argument_count {
        arguments.push(engine.pop()?);
    }

    let context = engine.current_context_mut().ok_or_else(no_context)?;
    if local_count > 0 {
        context.set_local_variables(Some(Slot::with_count(
            local_count,
            reference_counter.clone(),
        )));
    }
    if argument_count > 0 {
        context.set_arguments(Some(Slot::new(arguments, reference_counter)));
    }
    Ok(())
}

fn read(slot: Option<&Slot>, index: usize) -> VmResult<StackItem> {
    let slot = slot.ok_or_else(not_initialized)?;
    slot.get(index).cloned().map_err(|_| {
        VmError::invalid_operation_msg(format!(
            "Index out of range when loading from slot: {index}"
        ))
    })
}

fn write(slot: Option<&mut Slot>, index: usize, item: StackItem) -> VmResult<()> {
    let slot = slot.ok_or_else(not_initialized)?;
    if index >= slot.len() {
        return Err(VmError::invalid_operation_msg(format!(
            "Index out of range when storing to slot: {index}"
        )));
    }
    slot.set(index, item)
}

fn load(engine: &mut ExecutionEngine, kind: SlotKind, index: usize) -> VmResult<()> {
    let context = engine.current_context().ok_or_else(no_context)?;
    let item = match kind {
        SlotKind::Static => read(context.static_fields().as_ref(), index)?,
        SlotKind::Local => read(context.local_variables(), index)?,
        SlotKind::Argument => read(context.arguments(), index)?,
    };
    engine.push(item)
}

fn store(engine: &mut ExecutionEngine, kind: SlotKind, index: usize) -> VmResult<()> {
    let item = engine.pop()?;
    let context = engine.current_context_mut().ok_or_else(no_context)?;
    match kind {
        SlotKind::Static => write(context.static_fields_mut().as_mut(), index, item),
        SlotKind::Local => write(context.local_variables_mut(), index, item),
        SlotKind::Argument => write(context.arguments_mut(), index, item),
    }
}

fn ld_s_fld(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    load(engine, SlotKind::Static, slot_index(instruction, OpCode::LDSFLD0))
}

fn st_s_fld(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    store(engine, SlotKind::Static, slot_index(instruction, OpCode::STSFLD0))
}

fn ld_loc(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    load(engine, SlotKind::Local, slot_index(instruction, OpCode::LDLOC0))
}

fn st_loc(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    store(engine, SlotKind::Local, slot_index(instruction, OpCode::STLOC0))
}

fn ld_arg(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    load(engine, SlotKind::Argument, slot_index(instruction, OpCode::LDARG0))
}

fn st_arg(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    store(engine, SlotKind::Argument, slot_index(instruction, OpCode::STARG0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::vm_state::VMState;
    use num_bigint::BigInt;

    fn run(bytes: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(None);
        engine.load_script(Script::new(bytes), -1, 0).unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn test_locals_and_arguments() {
        // Arguments are popped in order: 2 becomes arg0, 1 becomes arg1.
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::INITSLOT as u8,
            1,
            2,
            OpCode::LDARG0 as u8,
            OpCode::LDARG1 as u8,
            OpCode::SUB as u8,
            OpCode::STLOC0 as u8,
            OpCode::LDLOC as u8,
            0,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            BigInt::from(1)
        );
    }

    #[test]
    fn test_static_fields() {
        let engine = run(vec![
            OpCode::INITSSLOT as u8,
            1,
            OpCode::PUSH7 as u8,
            OpCode::STSFLD0 as u8,
            OpCode::LDSFLD0 as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            BigInt::from(7)
        );
    }

    #[test]
    fn test_uninitialized_and_out_of_range() {
        let engine = run(vec![OpCode::LDLOC0 as u8]);
        assert_eq!(
            engine.fault_exception().unwrap().message(),
            "Slot has not been initialized."
        );

        let engine = run(vec![OpCode::INITSSLOT as u8, 1, OpCode::LDSFLD1 as u8]);
        assert_eq!(
            engine.fault_exception().unwrap().message(),
            "Index out of range when loading from slot: 1"
        );
    }

    #[test]
    fn test_init_twice_and_zero_operand() {
        let engine = run(vec![
            OpCode::INITSSLOT as u8,
            1,
            OpCode::INITSSLOT as u8,
            1,
        ]);
        assert_eq!(
            engine.fault_exception().unwrap().message(),
            "INITSSLOT cannot be executed twice."
        );

        let engine = run(vec![OpCode::INITSLOT as u8, 0, 0]);
        assert_eq!(
            engine.fault_exception().unwrap().message(),
            "The operand 0 is invalid for OpCode.INITSLOT."
        );
    }

    #[test]
    fn test_slot_references_released_on_return() {
        let mut engine = ExecutionEngine::new(None);
        engine
            .load_script(
                Script::new(vec![
                    OpCode::INITSLOT as u8,
                    3,
                    0,
                    OpCode::PUSH1 as u8,
                    OpCode::RET as u8,
                ]),
                -1,
                0,
            )
            .unwrap();
        assert_eq!(engine.execute(), VMState::HALT);
        assert_eq!(engine.reference_counter().count(), 1);
    }
}
