//! Type operations for the Neo Virtual Machine.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::JumpTable;
use crate::op_code::OpCode;
use crate::stack_item::StackItemType;

/// Registers the type operation handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::ISNULL, is_null);
    jump_table.register(OpCode::ISTYPE, is_type);
    jump_table.register(OpCode::CONVERT, convert);
}

fn is_null(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop()?;
    engine.push_bool(x.is_null())
}

/// Tests the exact type of the top item. `Any` is not a valid operand.
fn is_type(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop()?;
    let type_byte = instruction.token_u8();
    let item_type = match StackItemType::from_byte(type_byte) {
        Some(StackItemType::Any) | None => {
            return Err(VmError::invalid_operation_msg(format!(
                "Invalid type: {type_byte}"
            )))
        }
        Some(item_type) => item_type,
    };
    engine.push_bool(x.stack_item_type() == item_type)
}

fn convert(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop()?;
    let type_byte = instruction.token_u8();
    let target = StackItemType::from_byte(type_byte).ok_or_else(|| {
        VmError::invalid_type_msg(format!(
            "Type {} can't be converted to StackItemType: {type_byte}",
            x.stack_item_type()
        ))
    })?;
    let converted = x.convert_to(target)?;
    engine.push(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::stack_item::StackItem;
    use crate::vm_state::VMState;
    use num_bigint::BigInt;

    fn run(bytes: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new(None);
        engine.load_script(Script::new(bytes), -1, 0).unwrap();
        engine.execute();
        engine
    }

    fn top(engine: &ExecutionEngine) -> StackItem {
        engine.result_stack().peek(0).unwrap().clone()
    }

    #[test]
    fn test_is_null() {
        let engine = run(vec![OpCode::PUSHNULL as u8, OpCode::ISNULL as u8]);
        assert!(top(&engine).as_bool().unwrap());
        let engine = run(vec![OpCode::PUSH0 as u8, OpCode::ISNULL as u8]);
        assert!(!top(&engine).as_bool().unwrap());
    }

    #[test]
    fn test_is_type() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::ISTYPE as u8,
            StackItemType::Integer as u8,
        ]);
        assert!(top(&engine).as_bool().unwrap());

        let engine = run(vec![
            OpCode::PUSHT as u8,
            OpCode::ISTYPE as u8,
            StackItemType::Integer as u8,
        ]);
        assert!(!top(&engine).as_bool().unwrap());
    }

    #[test]
    fn test_is_type_rejects_any() {
        let engine = run(vec![OpCode::PUSH1 as u8, OpCode::ISTYPE as u8, 0x00]);
        assert_eq!(engine.state(), VMState::FAULT);
        assert_eq!(engine.fault_exception().unwrap().message(), "Invalid type: 0");
    }

    #[test]
    fn test_convert() {
        let engine = run(vec![
            OpCode::PUSHDATA1 as u8,
            1,
            0x05,
            OpCode::CONVERT as u8,
            StackItemType::Integer as u8,
        ]);
        let item = top(&engine);
        assert_eq!(item.stack_item_type(), StackItemType::Integer);
        assert_eq!(item.as_int().unwrap(), BigInt::from(5));

        let engine = run(vec![
            OpCode::PUSH0 as u8,
            OpCode::CONVERT as u8,
            StackItemType::Buffer as u8,
        ]);
        assert_eq!(top(&engine).stack_item_type(), StackItemType::Buffer);

        let engine = run(vec![
            OpCode::PUSHNULL as u8,
            OpCode::CONVERT as u8,
            StackItemType::Integer as u8,
        ]);
        assert!(top(&engine).is_null());
    }

    #[test]
    fn test_convert_array_to_integer_faults() {
        let engine = run(vec![
            OpCode::NEWARRAY0 as u8,
            OpCode::CONVERT as u8,
            StackItemType::Integer as u8,
        ]);
        assert_eq!(engine.state(), VMState::FAULT);
    }
}
