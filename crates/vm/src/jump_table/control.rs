//! Control flow operations for the Neo Virtual Machine.
//!
//! Jumps, calls, returns, system calls and structured exception handling.
//! Handlers that move the instruction pointer set the engine's jumping flag
//! so the engine does not advance it again.

use crate::error::{VmError, VmResult};
use crate::exception_handling::{ExceptionHandlingContext, ExceptionHandlingState};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::{offset_position, JumpTable};
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use crate::vm_state::VMState;

/// Registers the control operation handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::NOP, nop);
    jump_table.register(OpCode::JMP, jmp);
    jump_table.register(OpCode::JMP_L, jmp);
    for opcode in [
        OpCode::JMPIF,
        OpCode::JMPIF_L,
        OpCode::JMPIFNOT,
        OpCode::JMPIFNOT_L,
    ] {
        jump_table.register(opcode, jmp_if);
    }
    for opcode in [
        OpCode::JMPEQ,
        OpCode::JMPEQ_L,
        OpCode::JMPNE,
        OpCode::JMPNE_L,
        OpCode::JMPGT,
        OpCode::JMPGT_L,
        OpCode::JMPGE,
        OpCode::JMPGE_L,
        OpCode::JMPLT,
        OpCode::JMPLT_L,
        OpCode::JMPLE,
        OpCode::JMPLE_L,
    ] {
        jump_table.register(opcode, jmp_compare);
    }
    jump_table.register(OpCode::CALL, call);
    jump_table.register(OpCode::CALL_L, call);
    jump_table.register(OpCode::CALLA, calla);
    jump_table.register(OpCode::CALLT, callt);
    jump_table.register(OpCode::ABORT, abort);
    jump_table.register(OpCode::ASSERT, assert);
    jump_table.register(OpCode::THROW, throw);
    jump_table.register(OpCode::TRY, try_op);
    jump_table.register(OpCode::TRY_L, try_l);
    jump_table.register(OpCode::ENDTRY, end_try);
    jump_table.register(OpCode::ENDTRY_L, end_try_l);
    jump_table.register(OpCode::ENDFINALLY, end_finally);
    jump_table.register(OpCode::RET, ret);
    jump_table.register(OpCode::SYSCALL, syscall);
    jump_table.register(OpCode::ABORTMSG, abort_msg);
    jump_table.register(OpCode::ASSERTMSG, assert_msg);
}

fn no_context() -> VmError {
    VmError::invalid_operation_msg("No current context")
}

fn try_block_not_found() -> VmError {
    VmError::invalid_operation_msg("The corresponding TRY block cannot be found.")
}

/// Short jumps carry a signed byte, `_L` forms a signed 32-bit offset.
fn jump_offset(instruction: &Instruction) -> i32 {
    if instruction.opcode().byte() % 2 == 0 {
        i32::from(instruction.token_i8())
    } else {
        instruction.token_i32()
    }
}

fn current_position(engine: &ExecutionEngine, offset: i32) -> VmResult<i64> {
    let context = engine.current_context().ok_or_else(no_context)?;
    Ok(offset_position(context.instruction_pointer(), offset))
}

fn jump_out_of_range(position: i64) -> VmError {
    VmError::invalid_operation_msg(format!("Jump out of range for position: {position}"))
}

/// Moves the instruction pointer of the current context to `position`.
pub fn execute_jump(engine: &mut ExecutionEngine, position: i64) -> VmResult<()> {
    let context = engine.current_context_mut().ok_or_else(no_context)?;
    if position < 0 || position >= context.script().len() as i64 {
        return Err(jump_out_of_range(position));
    }
    context.set_instruction_pointer(position as usize);
    engine.is_jumping = true;
    Ok(())
}

/// Jumps relative to the current instruction.
pub fn execute_jump_offset(engine: &mut ExecutionEngine, offset: i32) -> VmResult<()> {
    let position = current_position(engine, offset)?;
    execute_jump(engine, position)
}

/// Loads a clone of the current context that starts at `position`.
///
/// The caller keeps its instruction pointer and resumes after the call
/// instruction once the callee returns.
pub fn execute_call(engine: &mut ExecutionEngine, position: i64) -> VmResult<()> {
    let context = engine.current_context().ok_or_else(no_context)?;
    if position < 0 || position > context.script().len() as i64 {
        return Err(jump_out_of_range(position));
    }
    let callee = context.clone_at(position as usize);
    engine.load_context(callee)
}

fn nop(_engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    Ok(())
}

fn jmp(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    execute_jump_offset(engine, jump_offset(instruction))
}

/// JMPIF and JMPIFNOT, in both widths.
fn jmp_if(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let expected = matches!(instruction.opcode(), OpCode::JMPIF | OpCode::JMPIF_L);
    if engine.pop_bool()? == expected {
        execute_jump_offset(engine, jump_offset(instruction))?;
    }
    Ok(())
}

/// The integer comparison jumps. The top item is the right operand.
fn jmp_compare(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    let taken = match instruction.opcode() {
        OpCode::JMPEQ | OpCode::JMPEQ_L => x1 == x2,
        OpCode::JMPNE | OpCode::JMPNE_L => x1 != x2,
        OpCode::JMPGT | OpCode::JMPGT_L => x1 > x2,
        OpCode::JMPGE | OpCode::JMPGE_L => x1 >= x2,
        OpCode::JMPLT | OpCode::JMPLT_L => x1 < x2,
        OpCode::JMPLE | OpCode::JMPLE_L => x1 <= x2,
        other => {
            return Err(VmError::invalid_operation_msg(format!(
                "{other} is not a comparison jump"
            )))
        }
    };
    if taken {
        execute_jump_offset(engine, jump_offset(instruction))?;
    }
    Ok(())
}

fn call(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let offset = if instruction.opcode() == OpCode::CALL {
        i32::from(instruction.token_i8())
    } else {
        instruction.token_i32()
    };
    let position = current_position(engine, offset)?;
    execute_call(engine, position)
}

fn calla(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let pointer = match engine.pop()? {
        StackItem::Pointer(pointer) => pointer,
        other => {
            return Err(VmError::invalid_type_msg(format!(
                "Invalid type for CALLA: {}",
                other.stack_item_type()
            )))
        }
    };
    let context = engine.current_context().ok_or_else(no_context)?;
    if !pointer.script().ptr_eq(context.script()) {
        return Err(VmError::invalid_operation_msg(
            "Pointers can't be shared between scripts",
        ));
    }
    execute_call(engine, pointer.position() as i64)
}

fn callt(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let token = instruction.token_u16();
    engine
        .with_interop_host(|host, engine| host.on_call_token(engine, token))
        .unwrap_or_else(|| {
            Err(VmError::invalid_operation_msg(format!(
                "Token not found: {token}"
            )))
        })
}

fn abort(_engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    Err(VmError::invalid_operation_msg("ABORT is executed."))
}

fn assert(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    if !engine.pop_bool()? {
        return Err(VmError::invalid_operation_msg(
            "ASSERT is executed with false result.",
        ));
    }
    Ok(())
}

fn abort_msg(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let reason = String::from_utf8_lossy(&engine.pop_bytes()?).into_owned();
    Err(VmError::invalid_operation_msg(format!(
        "ABORTMSG is executed. Reason: {reason}"
    )))
}

fn assert_msg(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let reason = String::from_utf8_lossy(&engine.pop_bytes()?).into_owned();
    if !engine.pop_bool()? {
        return Err(VmError::invalid_operation_msg(format!(
            "ASSERTMSG is executed with false result. Reason: {reason}"
        )));
    }
    Ok(())
}

fn throw(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let exception = engine.pop()?;
    execute_throw(engine, exception)
}

fn try_op(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let catch_offset = i32::from(instruction.token_i8());
    let finally_offset = i32::from(instruction.token_i8_1());
    execute_try(engine, catch_offset, finally_offset)
}

fn try_l(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    execute_try(engine, instruction.token_i32(), instruction.token_i32_1())
}

/// Pushes a new exception handling frame. A zero offset means the block is absent.
pub fn execute_try(
    engine: &mut ExecutionEngine,
    catch_offset: i32,
    finally_offset: i32,
) -> VmResult<()> {
    if catch_offset == 0 && finally_offset == 0 {
        return Err(VmError::invalid_operation_msg(
            "catchOffset and finallyOffset can't be 0 in a TRY block",
        ));
    }
    let max_depth = engine.limits().max_try_nesting_depth;
    let context = engine.current_context_mut().ok_or_else(no_context)?;
    let ip = context.instruction_pointer();
    let pointer = |offset: i32| -> VmResult<Option<usize>> {
        if offset == 0 {
            return Ok(None);
        }
        let position = offset_position(ip, offset);
        usize::try_from(position)
            .map(Some)
            .map_err(|_| jump_out_of_range(position))
    };
    let frame = ExceptionHandlingContext::new(pointer(catch_offset)?, pointer(finally_offset)?);

    let try_stack = context.try_stack_or_default();
    if try_stack.len() >= max_depth {
        return Err(VmError::invalid_operation_msg("MaxTryNestingDepth exceed."));
    }
    try_stack.push(frame);
    Ok(())
}

fn end_try(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    execute_end_try(engine, i32::from(instruction.token_i8()))
}

fn end_try_l(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    execute_end_try(engine, instruction.token_i32())
}

/// Leaves a `TRY` or `CATCH` block, running the `FINALLY` block first if there is one.
pub fn execute_end_try(engine: &mut ExecutionEngine, end_offset: i32) -> VmResult<()> {
    let context = engine.current_context_mut().ok_or_else(no_context)?;
    let end = offset_position(context.instruction_pointer(), end_offset);
    let end = usize::try_from(end).map_err(|_| jump_out_of_range(end))?;

    let try_stack = context.try_stack_mut().ok_or_else(try_block_not_found)?;
    let frame = try_stack.last_mut().ok_or_else(try_block_not_found)?;
    if frame.state() == ExceptionHandlingState::Finally {
        return Err(VmError::invalid_operation_msg(
            "The opcode ENDTRY can't be executed in a FINALLY block.",
        ));
    }

    let target = match frame.finally_pointer() {
        Some(finally) => {
            frame.set_state(ExceptionHandlingState::Finally);
            frame.set_end_pointer(end);
            finally
        }
        None => {
            try_stack.pop();
            end
        }
    };
    context.set_instruction_pointer(target);
    engine.is_jumping = true;
    Ok(())
}

/// Leaves a `FINALLY` block. A pending exception is rethrown, otherwise
/// execution continues at the end pointer recorded by `ENDTRY`.
fn end_finally(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let context = engine.invocation_stack.last_mut().ok_or_else(no_context)?;
    let frame = context
        .try_stack_mut()
        .and_then(Vec::pop)
        .ok_or_else(try_block_not_found)?;

    match engine.uncaught_exception.take() {
        None => {
            let end = frame.end_pointer().ok_or_else(|| {
                VmError::invalid_operation_msg("ENDFINALLY reached without a preceding ENDTRY.")
            })?;
            context.set_instruction_pointer(end);
        }
        Some(exception) => execute_throw(engine, exception)?,
    }
    engine.is_jumping = true;
    Ok(())
}

/// Unwinds to the nearest handler for `exception`.
///
/// Frames whose `FINALLY` already runs, and `CATCH` frames without one, are
/// discarded. Contexts above the handler are unloaded. If no handler exists
/// the error is returned and the engine faults, keeping the exception as the
/// uncaught exception.
pub fn execute_throw(engine: &mut ExecutionEngine, exception: StackItem) -> VmResult<()> {
    engine.uncaught_exception = Some(exception);

    let Some(handler_index) = find_handler(engine) else {
        let detail = engine
            .uncaught_exception
            .as_ref()
            .map(describe_exception)
            .unwrap_or_default();
        return Err(VmError::UnhandledException(detail));
    };

    while engine.invocation_stack.len() > handler_index + 1 {
        if let Some(context) = engine.invocation_stack.pop() {
            engine.unload_context(context);
        }
    }

    let context = engine.invocation_stack.last_mut().ok_or_else(no_context)?;
    let frame = context
        .try_stack_mut()
        .and_then(|stack| stack.last_mut())
        .ok_or_else(try_block_not_found)?;

    let caught = frame.state() == ExceptionHandlingState::Try && frame.has_catch();
    let target = if caught {
        frame.set_state(ExceptionHandlingState::Catch);
        frame.catch_pointer()
    } else {
        frame.set_state(ExceptionHandlingState::Finally);
        frame.finally_pointer()
    };
    let target = target.ok_or_else(try_block_not_found)?;
    context.set_instruction_pointer(target);

    if caught {
        if let Some(exception) = engine.uncaught_exception.take() {
            context.evaluation_stack_mut().push(exception);
        }
    }
    engine.is_jumping = true;
    Ok(())
}

/// Finds the innermost context with a live handler, discarding finished
/// frames on the way.
fn find_handler(engine: &mut ExecutionEngine) -> Option<usize> {
    for index in (0..engine.invocation_stack.len()).rev() {
        let Some(try_stack) = engine.invocation_stack[index].try_stack_mut() else {
            continue;
        };
        while let Some(frame) = try_stack.last() {
            let finished = match frame.state() {
                ExceptionHandlingState::Finally => true,
                ExceptionHandlingState::Catch => !frame.has_finally(),
                ExceptionHandlingState::Try => false,
            };
            if !finished {
                return Some(index);
            }
            try_stack.pop();
        }
    }
    None
}

fn describe_exception(exception: &StackItem) -> String {
    match exception {
        StackItem::ByteString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        StackItem::Buffer(buffer) => String::from_utf8_lossy(&buffer.data()).into_owned(),
        other => other.stack_item_type().to_string(),
    }
}

/// Returns from the current context.
///
/// Unless the caller shares the evaluation stack, the callee's items move
/// to the caller, or to the result stack when the last context returns.
fn ret(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let context = engine.invocation_stack.pop().ok_or_else(no_context)?;
    let shares_stack = engine
        .invocation_stack
        .last()
        .is_some_and(|caller| caller.shares_state_with(&context));

    if !shares_stack {
        let mut stack = context.evaluation_stack_mut();
        if context.rvcount() >= 0 && stack.len() != context.rvcount() as usize {
            return Err(VmError::invalid_operation_msg(
                "RVCount doesn't match with EvaluationStack",
            ));
        }
        match engine.invocation_stack.last() {
            Some(caller) => stack.move_to(&mut caller.evaluation_stack_mut(), None)?,
            None => stack.move_to(&mut engine.result_stack, None)?,
        }
    }

    if engine.invocation_stack.is_empty() {
        engine.set_state(VMState::HALT);
    }
    engine.unload_context(context);
    engine.is_jumping = true;
    Ok(())
}

fn syscall(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let method = instruction.token_u32();
    engine
        .with_interop_host(|host, engine| host.on_syscall(engine, method))
        .unwrap_or_else(|| {
            Err(VmError::invalid_operation_msg(format!(
                "Syscall not found: {method}"
            )))
        })
}
