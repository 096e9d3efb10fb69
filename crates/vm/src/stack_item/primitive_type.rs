//! Map keys.

use crate::error::{VmError, VmResult};
use crate::stack_item::integer;
use crate::stack_item::StackItem;
use num_bigint::BigInt;
use std::fmt;
use std::rc::Rc;

/// A primitive value usable as a map key.
///
/// Two keys are equal only when they have the same type and the same value,
/// so `Integer(1)` and `ByteString([1])` are distinct keys.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean(bool),
    Integer(BigInt),
    ByteString(Rc<[u8]>),
}

impl PrimitiveType {
    /// The encoded size used against the map key limit.
    pub fn size(&self) -> usize {
        match self {
            PrimitiveType::Boolean(_) => 1,
            PrimitiveType::Integer(i) => integer::byte_len(i),
            PrimitiveType::ByteString(b) => b.len(),
        }
    }

    /// Wraps the key back into a stack item.
    pub fn to_stack_item(&self) -> StackItem {
        match self {
            PrimitiveType::Boolean(b) => StackItem::Boolean(*b),
            PrimitiveType::Integer(i) => StackItem::Integer(i.clone()),
            PrimitiveType::ByteString(b) => StackItem::ByteString(Rc::clone(b)),
        }
    }
}

impl TryFrom<&StackItem> for PrimitiveType {
    type Error = VmError;

    fn try_from(item: &StackItem) -> VmResult<Self> {
        match item {
            StackItem::Boolean(b) => Ok(PrimitiveType::Boolean(*b)),
            StackItem::Integer(i) => Ok(PrimitiveType::Integer(i.clone())),
            StackItem::ByteString(b) => Ok(PrimitiveType::ByteString(Rc::clone(b))),
            other => Err(VmError::invalid_type_msg(format!(
                "{} cannot be used as a map key",
                other.stack_item_type()
            ))),
        }
    }
}

impl TryFrom<StackItem> for PrimitiveType {
    type Error = VmError;

    fn try_from(item: StackItem) -> VmResult<Self> {
        PrimitiveType::try_from(&item)
    }
}

impl From<bool> for PrimitiveType {
    fn from(value: bool) -> Self {
        PrimitiveType::Boolean(value)
    }
}

impl From<i32> for PrimitiveType {
    fn from(value: i32) -> Self {
        PrimitiveType::Integer(BigInt::from(value))
    }
}

impl From<i64> for PrimitiveType {
    fn from(value: i64) -> Self {
        PrimitiveType::Integer(BigInt::from(value))
    }
}

impl From<BigInt> for PrimitiveType {
    fn from(value: BigInt) -> Self {
        PrimitiveType::Integer(value)
    }
}

impl From<&[u8]> for PrimitiveType {
    fn from(value: &[u8]) -> Self {
        PrimitiveType::ByteString(Rc::from(value))
    }
}

impl From<&str> for PrimitiveType {
    fn from(value: &str) -> Self {
        PrimitiveType::ByteString(Rc::from(value.as_bytes()))
    }
}

impl fmt::Debug for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_stack_item(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_typed() {
        assert_ne!(PrimitiveType::from(1), PrimitiveType::from(&[1u8][..]));
        assert_ne!(PrimitiveType::from(true), PrimitiveType::from(1));
        assert_eq!(PrimitiveType::from(5), PrimitiveType::from(BigInt::from(5)));
    }

    #[test]
    fn test_buffers_are_not_keys() {
        let buffer = StackItem::from_buffer(vec![1, 2]);
        assert!(PrimitiveType::try_from(&buffer).is_err());
        assert!(PrimitiveType::try_from(&StackItem::Null).is_err());
    }
}
