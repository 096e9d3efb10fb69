//! Compound operations for the Neo Virtual Machine.
//!
//! This module provides the compound operation handlers for the Neo VM:
//! packing and unpacking, creation of arrays, structs and maps, and item access.
//! Structs are cloned whenever they are stored into another compound item.

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::jump_table::{non_negative, out_of_range, JumpTable};
use crate::op_code::OpCode;
use crate::stack_item::{Array, Map, PrimitiveType, StackItem, StackItemType, Struct};

/// Registers the compound operation handlers.
pub fn register_handlers(jump_table: &mut JumpTable) {
    jump_table.register(OpCode::PACKMAP, pack_map);
    jump_table.register(OpCode::PACKSTRUCT, pack_struct);
    jump_table.register(OpCode::PACK, pack);
    jump_table.register(OpCode::UNPACK, unpack);
    jump_table.register(OpCode::NEWARRAY0, new_array0);
    jump_table.register(OpCode::NEWARRAY, new_array);
    jump_table.register(OpCode::NEWARRAY_T, new_array_t);
    jump_table.register(OpCode::NEWSTRUCT0, new_struct0);
    jump_table.register(OpCode::NEWSTRUCT, new_struct);
    jump_table.register(OpCode::NEWMAP, new_map);
    jump_table.register(OpCode::SIZE, size);
    jump_table.register(OpCode::HASKEY, has_key);
    jump_table.register(OpCode::KEYS, keys);
    jump_table.register(OpCode::VALUES, values);
    jump_table.register(OpCode::PICKITEM, pick_item);
    jump_table.register(OpCode::APPEND, append);
    jump_table.register(OpCode::SETITEM, set_item);
    jump_table.register(OpCode::REVERSEITEMS, reverse_items);
    jump_table.register(OpCode::REMOVE, remove);
    jump_table.register(OpCode::CLEARITEMS, clear_items);
    jump_table.register(OpCode::POPITEM, pop_item);
}

fn invalid_type(opcode: OpCode, item: &StackItem) -> VmError {
    VmError::invalid_type_msg(format!(
        "Invalid type for {opcode}: {}",
        item.stack_item_type()
    ))
}

fn pop_key(engine: &mut ExecutionEngine) -> VmResult<PrimitiveType> {
    PrimitiveType::try_from(engine.pop()?)
}

/// Pops an array or struct, viewed as an array.
fn pop_array(engine: &mut ExecutionEngine, opcode: OpCode) -> VmResult<Array> {
    match engine.pop()? {
        StackItem::Array(array) => Ok(array),
        StackItem::Struct(s) => Ok(s.as_array().clone()),
        other => Err(invalid_type(opcode, &other)),
    }
}

/// The integer value of a key used as an index.
fn key_index(key: &PrimitiveType) -> VmResult<i32> {
    let value = key.to_stack_item().as_int()?;
    i32::try_from(&value).map_err(|_| {
        VmError::invalid_operation_msg(format!("Value {value} is out of range for Int32"))
    })
}

/// Validates `index` against `len`, raising a catchable exception when it is out of range.
fn checked_index(type_name: &str, index: i32, len: usize) -> VmResult<usize> {
    match usize::try_from(index) {
        Ok(i) if i < len => Ok(i),
        _ => Err(VmError::catchable_exception_msg(format!(
            "The index of {type_name} is out of range, {index}/[0, {len})."
        ))),
    }
}

/// Stores a value into a compound item. Structs are stored by value.
fn stored_value(engine: &ExecutionEngine, value: StackItem) -> VmResult<StackItem> {
    match value {
        StackItem::Struct(s) => Ok(StackItem::Struct(s.clone_struct(engine.limits())?)),
        other => Ok(other),
    }
}

/// Pops a count that must be between zero and the current stack depth.
fn pop_pack_size(engine: &mut ExecutionEngine, items_per_entry: usize) -> VmResult<usize> {
    let size = engine.pop_i32()?;
    let depth = engine
        .current_context()
        .map(|context| context.evaluation_stack().len())
        .unwrap_or(0);
    match usize::try_from(size) {
        Ok(n) if n * items_per_entry <= depth => Ok(n),
        _ => Err(out_of_range(size)),
    }
}

fn pack_map(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let size = pop_pack_size(engine, 2)?;
    let map = Map::new(Some(engine.reference_counter()));
    for _ in 0..size {
        let key = pop_key(engine)?;
        let value = engine.pop()?;
        map.set(key, value)?;
    }
    engine.push(StackItem::Map(map))
}

fn pack_struct(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let size = pop_pack_size(engine, 1)?;
    let mut items = Vec::with_capacity(size);
    for _ in 0..size {
        items.push(engine.pop()?);
    }
    let result = Struct::new(items, Some(engine.reference_counter()));
    engine.push(StackItem::Struct(result))
}

/// Packs the top `n` items into an array. The top item becomes element 0.
fn pack(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let size = pop_pack_size(engine, 1)?;
    let mut items = Vec::with_capacity(size);
    for _ in 0..size {
        items.push(engine.pop()?);
    }
    let result = Array::new(items, Some(engine.reference_counter()));
    engine.push(StackItem::Array(result))
}

/// Pushes the elements of a compound item followed by its size.
fn unpack(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let compound = engine.pop()?;
    let count = match &compound {
        StackItem::Map(map) => {
            let entries = map.entries();
            for (key, value) in entries.iter().rev() {
                engine.push(value.clone())?;
                engine.push(key.to_stack_item())?;
            }
            entries.len()
        }
        StackItem::Array(array) => push_reversed(engine, array.items())?,
        StackItem::Struct(s) => push_reversed(engine, s.items())?,
        other => return Err(invalid_type(instruction.opcode(), other)),
    };
    engine.push(StackItem::from_int(count as i64))
}

fn push_reversed(engine: &mut ExecutionEngine, items: Vec<StackItem>) -> VmResult<usize> {
    let count = items.len();
    for item in items.into_iter().rev() {
        engine.push(item)?;
    }
    Ok(count)
}

fn new_array0(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let array = Array::new(Vec::new(), Some(engine.reference_counter()));
    engine.push(StackItem::Array(array))
}

/// Pops an element count bounded by `max_stack_size`.
fn pop_element_count(engine: &mut ExecutionEngine) -> VmResult<usize> {
    let n = engine.pop_i32()?;
    match usize::try_from(n) {
        Ok(count) if count <= engine.limits().max_stack_size => Ok(count),
        _ => Err(VmError::invalid_operation_msg(format!(
            "MaxStackSize exceed: {n}"
        ))),
    }
}

fn new_array(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let n = pop_element_count(engine)?;
    let array = Array::new(vec![StackItem::Null; n], Some(engine.reference_counter()));
    engine.push(StackItem::Array(array))
}

/// Creates an array of `n` default values of the operand's type.
fn new_array_t(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let n = pop_element_count(engine)?;
    let type_byte = instruction.token_u8();
    let item_type = StackItemType::from_byte(type_byte).ok_or_else(|| {
        VmError::invalid_operation_msg(format!(
            "Invalid type for {}: {type_byte}",
            instruction.opcode()
        ))
    })?;
    let item = match item_type {
        StackItemType::Boolean => StackItem::Boolean(false),
        StackItemType::Integer => StackItem::from_int(0),
        StackItemType::ByteString => StackItem::from_byte_string(Vec::new()),
        _ => StackItem::Null,
    };
    let array = Array::new(vec![item; n], Some(engine.reference_counter()));
    engine.push(StackItem::Array(array))
}

fn new_struct0(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let result = Struct::new(Vec::new(), Some(engine.reference_counter()));
    engine.push(StackItem::Struct(result))
}

fn new_struct(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let n = pop_element_count(engine)?;
    let result = Struct::new(vec![StackItem::Null; n], Some(engine.reference_counter()));
    engine.push(StackItem::Struct(result))
}

fn new_map(engine: &mut ExecutionEngine, _instruction: &Instruction) -> VmResult<()> {
    let map = Map::new(Some(engine.reference_counter()));
    engine.push(StackItem::Map(map))
}

/// Element count of a compound item, or byte length of a primitive or buffer.
fn size(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop()?;
    let size = match &x {
        StackItem::Array(array) => array.len(),
        StackItem::Struct(s) => s.len(),
        StackItem::Map(map) => map.len(),
        StackItem::Buffer(buffer) => buffer.len(),
        StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::ByteString(_) => x.size()?,
        other => return Err(invalid_type(instruction.opcode(), other)),
    };
    engine.push(StackItem::from_int(size as i64))
}

fn has_key(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let key = pop_key(engine)?;
    let x = engine.pop()?;
    let opcode = instruction.opcode();
    let result = match &x {
        StackItem::Map(map) => map.contains_key(&key)?,
        StackItem::Array(_) | StackItem::Struct(_) | StackItem::Buffer(_) | StackItem::ByteString(_) => {
            let index = non_negative(key_index(&key)?, opcode)?;
            let len = match &x {
                StackItem::Array(array) => array.len(),
                StackItem::Struct(s) => s.len(),
                StackItem::Buffer(buffer) => buffer.len(),
                StackItem::ByteString(bytes) => bytes.len(),
                _ => 0,
            };
            index < len
        }
        other => return Err(invalid_type(opcode, other)),
    };
    engine.push_bool(result)
}

fn keys(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let map = match engine.pop()? {
        StackItem::Map(map) => map,
        other => return Err(invalid_type(instruction.opcode(), &other)),
    };
    let keys = map.keys().iter().map(PrimitiveType::to_stack_item).collect();
    let array = Array::new(keys, Some(engine.reference_counter()));
    engine.push(StackItem::Array(array))
}

/// Collects the values of an array or map into a new array, cloning structs.
fn values(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x = engine.pop()?;
    let source = match &x {
        StackItem::Array(array) => array.items(),
        StackItem::Struct(s) => s.items(),
        StackItem::Map(map) => map.values(),
        other => return Err(invalid_type(instruction.opcode(), other)),
    };
    let mut items = Vec::with_capacity(source.len());
    for item in source {
        items.push(stored_value(engine, item)?);
    }
    let array = Array::new(items, Some(engine.reference_counter()));
    engine.push(StackItem::Array(array))
}

fn pick_item(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let key = pop_key(engine)?;
    let x = engine.pop()?;
    let item = match &x {
        StackItem::Array(_) | StackItem::Struct(_) => {
            let array = match &x {
                StackItem::Struct(s) => s.as_array(),
                StackItem::Array(a) => a,
                _ => return Err(invalid_type(instruction.opcode(), &x)),
            };
            let index = checked_index("Array", key_index(&key)?, array.len())?;
            array
                .get(index)
                .ok_or_else(|| out_of_range(index))?
        }
        StackItem::Map(map) => map
            .get(&key)?
            .ok_or_else(|| VmError::catchable_exception_msg("Key not found in Map"))?,
        StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::ByteString(_) => {
            let bytes = x.as_bytes()?;
            let index = checked_index("PrimitiveType", key_index(&key)?, bytes.len())?;
            StackItem::from_int(bytes[index])
        }
        StackItem::Buffer(buffer) => {
            let index = checked_index("Buffer", key_index(&key)?, buffer.len())?;
            StackItem::from_int(buffer.data()[index])
        }
        other => return Err(invalid_type(instruction.opcode(), other)),
    };
    engine.push(item)
}

fn append(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let new_item = engine.pop()?;
    let array = pop_array(engine, instruction.opcode())?;
    let new_item = stored_value(engine, new_item)?;
    array.push(new_item)
}

fn set_item(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let value = engine.pop()?;
    let value = stored_value(engine, value)?;
    let key = pop_key(engine)?;
    let x = engine.pop()?;
    let opcode = instruction.opcode();
    match &x {
        StackItem::Array(_) | StackItem::Struct(_) => {
            let array = match &x {
                StackItem::Struct(s) => s.as_array(),
                StackItem::Array(a) => a,
                _ => return Err(invalid_type(opcode, &x)),
            };
            let index = checked_index("Array", key_index(&key)?, array.len())?;
            array.set(index, value)
        }
        StackItem::Map(map) => map.set(key, value),
        StackItem::Buffer(buffer) => {
            let index = checked_index("Buffer", key_index(&key)?, buffer.len())?;
            let byte = match &value {
                StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::ByteString(_) => {
                    value.as_int()?
                }
                _ => {
                    return Err(VmError::invalid_operation_msg(format!(
                        "Value must be a primitive type in {opcode}"
                    )))
                }
            };
            let b = i16::try_from(&byte)
                .ok()
                .filter(|b| (i16::from(i8::MIN)..=i16::from(u8::MAX)).contains(b))
                .ok_or_else(|| {
                    VmError::invalid_operation_msg(format!(
                        "Overflow in {opcode}, {byte} is not a byte type."
                    ))
                })?;
            buffer.data_mut()[index] = b as u8;
            Ok(())
        }
        other => Err(invalid_type(opcode, other)),
    }
}

fn reverse_items(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    match engine.pop()? {
        StackItem::Array(array) => array.reverse(),
        StackItem::Struct(s) => s.reverse(),
        StackItem::Buffer(buffer) => {
            buffer.data_mut().reverse();
            Ok(())
        }
        other => Err(invalid_type(instruction.opcode(), &other)),
    }
}

fn remove(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let key = pop_key(engine)?;
    let x = engine.pop()?;
    match &x {
        StackItem::Array(_) | StackItem::Struct(_) => {
            let array = match &x {
                StackItem::Struct(s) => s.as_array(),
                StackItem::Array(a) => a,
                _ => return Err(invalid_type(instruction.opcode(), &x)),
            };
            let index = key_index(&key)?;
            let len = array.len();
            let index = match usize::try_from(index) {
                Ok(i) if i < len => i,
                _ => {
                    return Err(VmError::invalid_operation_msg(format!(
                        "The index of Array is out of range, {index}/[0, {len})."
                    )))
                }
            };
            array.remove_at(index)?;
            Ok(())
        }
        StackItem::Map(map) => {
            map.remove(&key)?;
            Ok(())
        }
        other => Err(invalid_type(instruction.opcode(), other)),
    }
}

fn clear_items(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    match engine.pop()? {
        StackItem::Array(array) => array.clear(),
        StackItem::Struct(s) => s.clear(),
        StackItem::Map(map) => map.clear(),
        other => Err(invalid_type(instruction.opcode(), &other)),
    }
}

/// Removes the last element of an array and pushes it.
fn pop_item(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let array = pop_array(engine, instruction.opcode())?;
    let index = array
        .len()
        .checked_sub(1)
        .ok_or_else(|| out_of_range(-1))?;
    let item = array.get(index).ok_or_else(|| out_of_range(index))?;
    engine.push(item)?;
    array.remove_at(index)?;
    Ok(())
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

    fn top(engine: &ExecutionEngine) -> StackItem {
        engine.result_stack().peek(0).unwrap().clone()
    }

    #[test]
    fn test_pack_and_unpack() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::PUSH3 as u8,
            OpCode::PUSH3 as u8,
            OpCode::PACK as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        let StackItem::Array(array) = top(&engine) else {
            panic!("expected an array");
        };
        let values: Vec<BigInt> = array.items().iter().map(|i| i.as_int().unwrap()).collect();
        assert_eq!(values, vec![BigInt::from(3), BigInt::from(2), BigInt::from(1)]);

        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::PUSH2 as u8,
            OpCode::PACK as u8,
            OpCode::UNPACK as u8,
        ]);
        let ints: Vec<BigInt> = engine
            .result_stack()
            .as_slice()
            .iter()
            .map(|i| i.as_int().unwrap())
            .collect();
        assert_eq!(ints, vec![BigInt::from(1), BigInt::from(2), BigInt::from(2)]);
    }

    #[test]
    fn test_pack_size_out_of_range() {
        let engine = run(vec![OpCode::PUSH1 as u8, OpCode::PACK as u8]);
        assert_eq!(engine.state(), VMState::FAULT);
        assert_eq!(
            engine.fault_exception().unwrap().message(),
            "The value 1 is out of range."
        );
    }

    #[test]
    fn test_pack_map_and_pick() {
        // value, key pairs: {1: 10}
        let engine = run(vec![
            OpCode::PUSH10 as u8,
            OpCode::PUSH1 as u8,
            OpCode::PUSH1 as u8,
            OpCode::PACKMAP as u8,
            OpCode::PUSH1 as u8,
            OpCode::PICKITEM as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(top(&engine).as_int().unwrap(), BigInt::from(10));
    }

    #[test]
    fn test_pick_item_out_of_range_is_catchable() {
        let engine = run(vec![
            OpCode::NEWARRAY0 as u8,
            OpCode::PUSH0 as u8,
            OpCode::PICKITEM as u8,
        ]);
        assert_eq!(engine.state(), VMState::FAULT);
        assert!(engine
            .fault_exception()
            .unwrap()
            .message()
            .contains("The index of Array is out of range, 0/[0, 0)."));
    }

    #[test]
    fn test_pick_item_from_byte_string() {
        let engine = run(vec![
            OpCode::PUSHDATA1 as u8,
            2,
            0xAB,
            0xCD,
            OpCode::PUSH1 as u8,
            OpCode::PICKITEM as u8,
        ]);
        assert_eq!(top(&engine).as_int().unwrap(), BigInt::from(0xCD));
    }

    #[test]
    fn test_new_array_t_defaults() {
        let engine = run(vec![
            OpCode::PUSH2 as u8,
            OpCode::NEWARRAY_T as u8,
            StackItemType::Integer as u8,
        ]);
        let StackItem::Array(array) = top(&engine) else {
            panic!("expected an array");
        };
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(0).unwrap().as_int().unwrap(), BigInt::from(0));

        let engine = run(vec![OpCode::PUSH1 as u8, OpCode::NEWARRAY_T as u8, 0x99]);
        assert_eq!(engine.state(), VMState::FAULT);
        assert_eq!(
            engine.fault_exception().unwrap().message(),
            "Invalid type for NEWARRAY_T: 153"
        );
    }

    #[test]
    fn test_append_clones_structs() {
        // array.append(s); s[0] = 5; array[0][0] is still null.
        let engine = run(vec![
            OpCode::NEWARRAY0 as u8,
            OpCode::PUSH1 as u8,
            OpCode::NEWSTRUCT as u8,
            OpCode::OVER as u8,
            OpCode::OVER as u8,
            OpCode::APPEND as u8,
            OpCode::PUSH0 as u8,
            OpCode::PUSH5 as u8,
            OpCode::SETITEM as u8,
            OpCode::PUSH0 as u8,
            OpCode::PICKITEM as u8,
            OpCode::PUSH0 as u8,
            OpCode::PICKITEM as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert!(top(&engine).is_null());
    }

    #[test]
    fn test_set_item_on_buffer() {
        let engine = run(vec![
            OpCode::PUSH2 as u8,
            OpCode::NEWBUFFER as u8,
            OpCode::DUP as u8,
            OpCode::PUSH0 as u8,
            OpCode::PUSHM1 as u8,
            OpCode::SETITEM as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(top(&engine).as_bytes().unwrap(), vec![0xFF, 0x00]);

        let engine = run(vec![
            OpCode::PUSH2 as u8,
            OpCode::NEWBUFFER as u8,
            OpCode::PUSH0 as u8,
            OpCode::PUSHINT16 as u8,
            0x00,
            0x01,
            OpCode::SETITEM as u8,
        ]);
        assert_eq!(
            engine.fault_exception().unwrap().message(),
            "Overflow in SETITEM, 256 is not a byte type."
        );
    }

    #[test]
    fn test_map_operations() {
        let engine = run(vec![
            OpCode::NEWMAP as u8,
            OpCode::DUP as u8,
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::SETITEM as u8,
            OpCode::DUP as u8,
            OpCode::PUSH1 as u8,
            OpCode::HASKEY as u8,
            OpCode::SWAP as u8,
            OpCode::DUP as u8,
            OpCode::PUSH1 as u8,
            OpCode::REMOVE as u8,
            OpCode::SIZE as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        let items = engine.result_stack().as_slice();
        assert!(items[0].as_bool().unwrap());
        assert_eq!(items[1].as_int().unwrap(), BigInt::from(0));
    }

    #[test]
    fn test_oversized_map_key_faults_on_lookup() {
        for opcode in [OpCode::PICKITEM, OpCode::HASKEY] {
            let mut script = vec![OpCode::NEWMAP as u8, OpCode::PUSHDATA1 as u8, 65];
            script.extend([0u8; 65]);
            script.push(opcode as u8);

            let engine = run(script);
            assert_eq!(engine.state(), VMState::FAULT);
            assert_eq!(
                engine.fault_exception().unwrap().message(),
                "MaxKeySize exceed: 65"
            );
        }
    }

    #[test]
    fn test_pop_item_and_reverse() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::PUSH3 as u8,
            OpCode::PUSH3 as u8,
            OpCode::PACK as u8,
            OpCode::DUP as u8,
            OpCode::REVERSEITEMS as u8,
            OpCode::POPITEM as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(top(&engine).as_int().unwrap(), BigInt::from(3));
    }

    #[test]
    fn test_size_of_null_faults() {
        let engine = run(vec![OpCode::PUSHNULL as u8, OpCode::SIZE as u8]);
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn test_new_array_too_large() {
        let engine = run(vec![
            OpCode::PUSHINT16 as u8,
            0x01,
            0x08,
            OpCode::NEWARRAY as u8,
        ]);
        assert_eq!(engine.state(), VMState::FAULT);
        assert_eq!(
            engine.fault_exception().unwrap().message(),
            "MaxStackSize exceed: 2049"
        );
    }
}
