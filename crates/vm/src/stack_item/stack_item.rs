//! Stack item implementation for the Neo Virtual Machine.
//!
//! This module provides the [`StackItem`] value model together with its
//! conversion, equality and deep copy rules.

use crate::error::{VmError, VmResult};
use crate::execution_engine_limits::ExecutionEngineLimits;
use crate::script::Script;
use crate::stack_item::integer;
use crate::stack_item::{
    Array, Buffer, InteropInterface, Map, Pointer, StackItemType, Struct,
};
use hashbrown::HashMap;
use num_bigint::BigInt;
use num_traits::{One, Zero};
use std::any::Any;
use std::rc::Rc;

/// Represents a value in the Neo VM.
///
/// Primitive variants are values. `Buffer`, `Array`, `Struct` and `Map` are
/// handles: cloning the item aliases the same storage.
#[derive(Debug, Clone)]
pub enum StackItem {
    /// Represents a null value.
    Null,

    /// Represents a boolean value.
    Boolean(bool),

    /// Represents an integer value.
    Integer(BigInt),

    /// Represents an immutable byte string.
    ByteString(Rc<[u8]>),

    /// Represents a mutable byte buffer.
    Buffer(Buffer),

    /// Represents an array of stack items.
    Array(Array),

    /// Represents a struct of stack items.
    Struct(Struct),

    /// Represents a map of stack items.
    Map(Map),

    /// Represents a pointer to a position in a script.
    Pointer(Pointer),

    /// Represents an interop interface.
    InteropInterface(InteropInterface),
}

impl StackItem {
    /// The singleton True value.
    pub fn true_value() -> Self {
        StackItem::Boolean(true)
    }

    /// The singleton False value.
    pub fn false_value() -> Self {
        StackItem::Boolean(false)
    }

    /// The singleton Null value.
    pub fn null() -> Self {
        StackItem::Null
    }

    /// Creates a boolean stack item.
    pub fn from_bool(value: bool) -> Self {
        StackItem::Boolean(value)
    }

    /// Creates an integer stack item.
    pub fn from_int<T: Into<BigInt>>(value: T) -> Self {
        StackItem::Integer(value.into())
    }

    /// Creates a byte string stack item.
    pub fn from_byte_string<T: Into<Vec<u8>>>(value: T) -> Self {
        StackItem::ByteString(Rc::from(value.into()))
    }

    /// Creates a buffer stack item.
    pub fn from_buffer<T: Into<Vec<u8>>>(value: T) -> Self {
        StackItem::Buffer(Buffer::new(value.into()))
    }

    /// Creates a pointer stack item.
    pub fn from_pointer(script: Script, position: usize) -> Self {
        StackItem::Pointer(Pointer::new(script, position))
    }

    /// Creates an interop interface stack item.
    pub fn from_interface<T: Any>(value: T) -> Self {
        StackItem::InteropInterface(InteropInterface::new(value))
    }

    /// Returns the type of the stack item.
    pub fn stack_item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::Pointer(_) => StackItemType::Pointer,
            StackItem::InteropInterface(_) => StackItemType::InteropInterface,
        }
    }

    /// Returns true if the stack item is null.
    pub fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    /// The identity of buffers and compound items, which the reference counter tracks.
    pub fn tracking_id(&self) -> Option<usize> {
        match self {
            StackItem::Buffer(b) => Some(b.id()),
            StackItem::Array(a) => Some(a.id()),
            StackItem::Struct(s) => Some(s.id()),
            StackItem::Map(m) => Some(m.id()),
            _ => None,
        }
    }

    /// The number of live handles to a tracked item's shared storage.
    pub(crate) fn handle_count(&self) -> Option<usize> {
        match self {
            StackItem::Buffer(b) => Some(b.handle_count()),
            StackItem::Array(a) => Some(a.handle_count()),
            StackItem::Struct(s) => Some(s.handle_count()),
            StackItem::Map(m) => Some(m.handle_count()),
            _ => None,
        }
    }

    /// Converts the stack item to a boolean.
    pub fn as_bool(&self) -> VmResult<bool> {
        match self {
            StackItem::Null => Ok(false),
            StackItem::Boolean(b) => Ok(*b),
            StackItem::Integer(i) => Ok(!i.is_zero()),
            StackItem::ByteString(bytes) => {
                if bytes.len() > integer::MAX_SIZE {
                    return Err(VmError::invalid_type_msg(format!(
                        "MaxSize exceed: {}",
                        bytes.len()
                    )));
                }
                Ok(bytes.iter().any(|b| *b != 0))
            }
            StackItem::Buffer(_)
            | StackItem::Array(_)
            | StackItem::Struct(_)
            | StackItem::Map(_)
            | StackItem::Pointer(_)
            | StackItem::InteropInterface(_) => Ok(true),
        }
    }

    /// Converts the stack item to an integer.
    pub fn as_int(&self) -> VmResult<BigInt> {
        match self {
            StackItem::Integer(i) => Ok(i.clone()),
            StackItem::Boolean(b) => Ok(if *b { BigInt::one() } else { BigInt::zero() }),
            StackItem::ByteString(bytes) => Self::decode_integer(bytes),
            StackItem::Buffer(buffer) => Self::decode_integer(&buffer.data()),
            other => Err(VmError::invalid_type_msg(format!(
                "{} cannot be converted to Integer",
                other.stack_item_type()
            ))),
        }
    }

    fn decode_integer(bytes: &[u8]) -> VmResult<BigInt> {
        if bytes.len() > integer::MAX_SIZE {
            return Err(VmError::invalid_type_msg(format!(
                "MaxSize exceed: {}",
                bytes.len()
            )));
        }
        Ok(integer::from_bytes(bytes))
    }

    /// Returns the byte representation of a primitive item or buffer.
    pub fn as_bytes(&self) -> VmResult<Vec<u8>> {
        match self {
            StackItem::ByteString(bytes) => Ok(bytes.to_vec()),
            StackItem::Buffer(buffer) => Ok(buffer.to_vec()),
            StackItem::Integer(i) => Ok(integer::to_bytes(i)),
            StackItem::Boolean(b) => Ok(vec![u8::from(*b)]),
            other => Err(VmError::invalid_type_msg(format!(
                "{} has no byte representation",
                other.stack_item_type()
            ))),
        }
    }

    /// The size in bytes of a primitive item or buffer.
    pub fn size(&self) -> VmResult<usize> {
        match self {
            StackItem::ByteString(bytes) => Ok(bytes.len()),
            StackItem::Buffer(buffer) => Ok(buffer.len()),
            StackItem::Integer(i) => Ok(integer::byte_len(i)),
            StackItem::Boolean(_) => Ok(1),
            other => Err(VmError::invalid_type_msg(format!(
                "{} has no byte size",
                other.stack_item_type()
            ))),
        }
    }

    /// Returns the wrapped host object if this is an interop interface holding a `T`.
    pub fn get_interface<T: Any>(&self) -> Option<&T> {
        match self {
            StackItem::InteropInterface(interface) => interface.get_interface::<T>(),
            _ => None,
        }
    }

    /// Compares two items.
    ///
    /// Structs compare structurally; buffers, arrays and maps compare by
    /// reference; primitives compare by type and value.
    pub fn equals(&self, other: &StackItem, limits: &ExecutionEngineLimits) -> VmResult<bool> {
        match self {
            StackItem::Struct(s) => s.equals(other, limits),
            StackItem::ByteString(bytes) => {
                let mut limit = limits.max_comparable_size;
                byte_string_equals(bytes, other, &mut limit)
            }
            _ => Ok(self.equals_shallow(other)),
        }
    }

    fn equals_shallow(&self, other: &StackItem) -> bool {
        match (self, other) {
            (StackItem::Null, StackItem::Null) => true,
            (StackItem::Boolean(a), StackItem::Boolean(b)) => a == b,
            (StackItem::Integer(a), StackItem::Integer(b)) => a == b,
            (StackItem::ByteString(a), StackItem::ByteString(b)) => a == b,
            (StackItem::Buffer(a), StackItem::Buffer(b)) => a.ptr_eq(b),
            (StackItem::Array(a), StackItem::Array(b)) => a.ptr_eq(b),
            (StackItem::Struct(a), StackItem::Struct(b)) => a.ptr_eq(b),
            (StackItem::Map(a), StackItem::Map(b)) => a.ptr_eq(b),
            (StackItem::Pointer(a), StackItem::Pointer(b)) => a.equals(b),
            (StackItem::InteropInterface(a), StackItem::InteropInterface(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Copies the item graph. Shared and cyclic references are preserved
    /// within the copy, and copied compounds are read-only. With
    /// `as_immutable`, buffers become byte strings.
    pub fn deep_copy(&self, as_immutable: bool) -> StackItem {
        let mut ref_map = HashMap::new();
        self.deep_copy_with(&mut ref_map, as_immutable)
    }

    fn deep_copy_with(
        &self,
        ref_map: &mut HashMap<usize, StackItem>,
        as_immutable: bool,
    ) -> StackItem {
        if let Some(mapped) = self.tracking_id().and_then(|id| ref_map.get(&id)) {
            return mapped.clone();
        }

        match self {
            StackItem::Buffer(buffer) => {
                let result = if as_immutable {
                    StackItem::from_byte_string(buffer.to_vec())
                } else {
                    StackItem::from_buffer(buffer.to_vec())
                };
                ref_map.insert(buffer.id(), result.clone());
                result
            }
            StackItem::Array(array) => {
                let counter = array.reference_counter();
                let result = Array::new(Vec::new(), counter.as_ref());
                ref_map.insert(array.id(), StackItem::Array(result.clone()));
                for item in array.items() {
                    let copy = item.deep_copy_with(ref_map, as_immutable);
                    result.append_unchecked(copy);
                }
                result.set_read_only(true);
                StackItem::Array(result)
            }
            StackItem::Struct(source) => {
                let counter = source.reference_counter();
                let result = Struct::new(Vec::new(), counter.as_ref());
                ref_map.insert(source.id(), StackItem::Struct(result.clone()));
                for item in source.items() {
                    let copy = item.deep_copy_with(ref_map, as_immutable);
                    result.append_unchecked(copy);
                }
                result.set_read_only(true);
                StackItem::Struct(result)
            }
            StackItem::Map(map) => {
                let counter = map.reference_counter();
                let result = Map::new(counter.as_ref());
                ref_map.insert(map.id(), StackItem::Map(result.clone()));
                for (key, value) in map.entries() {
                    let copy = value.deep_copy_with(ref_map, as_immutable);
                    result.insert_unchecked(key, copy);
                }
                result.set_read_only(true);
                StackItem::Map(result)
            }
            other => other.clone(),
        }
    }

    /// Converts the item to `target`, as the `CONVERT` opcode does.
    pub fn convert_to(&self, target: StackItemType) -> VmResult<StackItem> {
        let invalid = || {
            VmError::invalid_type_msg(format!(
                "Type {} can't be converted to StackItemType: {target}",
                self.stack_item_type()
            ))
        };

        if let StackItem::Null = self {
            return if target == StackItemType::Any {
                Err(invalid())
            } else {
                Ok(StackItem::Null)
            };
        }

        if target == self.stack_item_type() {
            return Ok(self.clone());
        }

        match (self, target) {
            (
                StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::ByteString(_),
                StackItemType::Integer,
            ) => Ok(StackItem::Integer(self.as_int()?)),
            (
                StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::ByteString(_),
                StackItemType::ByteString,
            ) => Ok(StackItem::from_byte_string(self.as_bytes()?)),
            (
                StackItem::Boolean(_) | StackItem::Integer(_) | StackItem::ByteString(_),
                StackItemType::Buffer,
            ) => Ok(StackItem::from_buffer(self.as_bytes()?)),
            (StackItem::Buffer(buffer), StackItemType::Integer) => {
                if buffer.len() > integer::MAX_SIZE {
                    return Err(invalid());
                }
                Ok(StackItem::Integer(integer::from_bytes(&buffer.data())))
            }
            (StackItem::Buffer(buffer), StackItemType::ByteString) => {
                Ok(StackItem::from_byte_string(buffer.to_vec()))
            }
            (StackItem::Array(array), StackItemType::Struct) => Ok(StackItem::Struct(
                Struct::new(array.items(), array.reference_counter().as_ref()),
            )),
            (StackItem::Struct(s), StackItemType::Array) => Ok(StackItem::Array(Array::new(
                s.items(),
                s.reference_counter().as_ref(),
            ))),
            (_, StackItemType::Boolean) => Ok(StackItem::Boolean(self.as_bool()?)),
            _ => Err(invalid()),
        }
    }

    /// Direct children as seen by the reference counter.
    pub(crate) fn sub_items(&self) -> Vec<StackItem> {
        match self {
            StackItem::Array(a) => a.items(),
            StackItem::Struct(s) => s.items(),
            StackItem::Map(m) => m.sub_items(),
            _ => Vec::new(),
        }
    }

    /// Empties a compound item without reporting to the counter.
    pub(crate) fn cleanup(&self) -> Vec<StackItem> {
        match self {
            StackItem::Array(a) => a.cleanup(),
            StackItem::Struct(s) => s.cleanup(),
            StackItem::Map(m) => m.cleanup(),
            _ => Vec::new(),
        }
    }
}

/// Compares a byte string with `other`, charging the compared length to `limit`.
pub(crate) fn byte_string_equals(
    bytes: &Rc<[u8]>,
    other: &StackItem,
    limit: &mut usize,
) -> VmResult<bool> {
    let exceeded = || VmError::invalid_operation_msg("The operand exceeds the maximum comparable size.");
    if bytes.len() > *limit || *limit == 0 {
        return Err(exceeded());
    }

    let StackItem::ByteString(other) = other else {
        *limit -= 1;
        return Ok(false);
    };

    let compared = bytes.len().max(other.len()).max(1);
    if Rc::ptr_eq(bytes, other) {
        *limit = limit.saturating_sub(compared);
        return Ok(true);
    }
    if other.len() > *limit {
        *limit = limit.saturating_sub(compared);
        return Err(exceeded());
    }
    *limit = limit.saturating_sub(compared);
    Ok(bytes[..] == other[..])
}

impl From<bool> for StackItem {
    fn from(value: bool) -> Self {
        StackItem::Boolean(value)
    }
}

impl From<BigInt> for StackItem {
    fn from(value: BigInt) -> Self {
        StackItem::Integer(value)
    }
}

impl From<i64> for StackItem {
    fn from(value: i64) -> Self {
        StackItem::Integer(BigInt::from(value))
    }
}

impl From<&str> for StackItem {
    fn from(value: &str) -> Self {
        StackItem::from_byte_string(value.as_bytes())
    }
}

impl From<Array> for StackItem {
    fn from(value: Array) -> Self {
        StackItem::Array(value)
    }
}

impl From<Struct> for StackItem {
    fn from(value: Struct) -> Self {
        StackItem::Struct(value)
    }
}

impl From<Map> for StackItem {
    fn from(value: Map) -> Self {
        StackItem::Map(value)
    }
}
