//! Struct stack item implementation for the Neo Virtual Machine.
//!
//! A [`Struct`] stores its items exactly like an [`Array`] but behaves as a
//! value: equality is structural and it is cloned whenever it is stored into
//! another compound item. Both operations walk the item graph with explicit
//! work lists and fixed budgets, so deeply nested or cyclic structs fault
//! instead of exhausting the native stack.

use crate::error::{VmError, VmResult};
use crate::execution_engine_limits::ExecutionEngineLimits;
use crate::reference_counter::ReferenceCounter;
use crate::stack_item::stack_item::byte_string_equals;
use crate::stack_item::{Array, StackItem};
use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;

/// Represents a struct of stack items in the VM.
#[derive(Clone)]
pub struct Struct(Array);

impl Struct {
    /// Creates a new struct holding `items`, registered with `reference_counter` if given.
    pub fn new(items: Vec<StackItem>, reference_counter: Option<&ReferenceCounter>) -> Self {
        let result = Struct(Array::detached(reference_counter));
        result
            .0
            .attach(&StackItem::Struct(result.clone()), items, reference_counter);
        result
    }

    /// The items viewed as an array handle sharing the same storage.
    pub fn as_array(&self) -> &Array {
        &self.0
    }

    /// Copies the struct and every struct nested in it, breadth first.
    ///
    /// Non-struct items are shared, not copied. At most
    /// `max_stack_size - 1` items are visited.
    pub fn clone_struct(&self, limits: &ExecutionEngineLimits) -> VmResult<Struct> {
        let counter = self.reference_counter();
        let mut budget = limits.max_stack_size as i64 - 1;
        let result = Struct::new(Vec::new(), counter.as_ref());

        let mut queue = VecDeque::from([(result.clone(), self.clone())]);
        while let Some((target, source)) = queue.pop_front() {
            for item in source.items() {
                budget -= 1;
                if budget < 0 {
                    return Err(VmError::invalid_operation_msg("Beyond clone limits!"));
                }
                match item {
                    StackItem::Struct(nested) => {
                        let copy = Struct::new(Vec::new(), counter.as_ref());
                        target.push(StackItem::Struct(copy.clone()))?;
                        queue.push_back((copy, nested));
                    }
                    other => target.push(other)?,
                }
            }
        }

        Ok(result)
    }

    /// Structural equality bounded by `max_stack_size` visited items and
    /// `max_comparable_size` compared bytes.
    pub fn equals(&self, other: &StackItem, limits: &ExecutionEngineLimits) -> VmResult<bool> {
        let StackItem::Struct(other) = other else {
            return Ok(false);
        };

        let mut left = vec![StackItem::Struct(self.clone())];
        let mut right = vec![StackItem::Struct(other.clone())];
        let mut count = limits.max_stack_size;
        let mut comparable = limits.max_comparable_size;

        while let (Some(a), Some(b)) = (left.pop(), right.pop()) {
            if count == 0 {
                return Err(VmError::invalid_operation_msg(
                    "Too many struct items to compare.",
                ));
            }
            count -= 1;

            if let StackItem::ByteString(bytes) = &a {
                if !byte_string_equals(bytes, &b, &mut comparable)? {
                    return Ok(false);
                }
                continue;
            }

            if comparable == 0 {
                return Err(VmError::invalid_operation_msg(
                    "The operand exceeds the maximum comparable size.",
                ));
            }
            comparable -= 1;

            match (&a, &b) {
                (StackItem::Struct(sa), StackItem::Struct(sb)) => {
                    if sa.ptr_eq(sb) {
                        continue;
                    }
                    if sa.len() != sb.len() {
                        return Ok(false);
                    }
                    left.extend(sa.items());
                    right.extend(sb.items());
                }
                (StackItem::Struct(_), _) => return Ok(false),
                _ => {
                    if !a.equals(&b, limits)? {
                        return Ok(false);
                    }
                }
            }
        }

        Ok(true)
    }
}

impl Deref for Struct {
    type Target = Array;

    fn deref(&self) -> &Array {
        &self.0
    }
}

impl fmt::Debug for Struct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Struct#{}(len {})", self.id(), self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ExecutionEngineLimits {
        ExecutionEngineLimits::default()
    }

    #[test]
    fn test_structural_equality() {
        let a = Struct::new(
            vec![
                StackItem::from_int(1),
                StackItem::Struct(Struct::new(vec![StackItem::from_int(2)], None)),
            ],
            None,
        );
        let b = Struct::new(
            vec![
                StackItem::from_int(1),
                StackItem::Struct(Struct::new(vec![StackItem::from_int(2)], None)),
            ],
            None,
        );
        assert!(a.equals(&StackItem::Struct(b), &limits()).unwrap());

        let c = Struct::new(vec![StackItem::from_int(1)], None);
        assert!(!a.equals(&StackItem::Struct(c), &limits()).unwrap());
        assert!(!a.equals(&StackItem::Null, &limits()).unwrap());
    }

    #[test]
    fn test_nested_arrays_compare_by_reference() {
        let shared = Array::new(vec![StackItem::from_int(1)], None);
        let a = Struct::new(vec![StackItem::Array(shared.clone())], None);
        let b = Struct::new(vec![StackItem::Array(shared)], None);
        let c = Struct::new(
            vec![StackItem::Array(Array::new(vec![StackItem::from_int(1)], None))],
            None,
        );
        assert!(a.equals(&StackItem::Struct(b), &limits()).unwrap());
        assert!(!a.equals(&StackItem::Struct(c), &limits()).unwrap());
    }

    #[test]
    fn test_clone_copies_nested_structs() {
        let inner = Struct::new(vec![StackItem::from_int(2)], None);
        let outer = Struct::new(vec![StackItem::Struct(inner.clone())], None);
        let copy = outer.clone_struct(&limits()).unwrap();

        let Some(StackItem::Struct(copied_inner)) = copy.get(0) else {
            panic!("expected a nested struct");
        };
        assert!(!copied_inner.ptr_eq(&inner));
        copied_inner.push(StackItem::from_int(3)).unwrap();
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn test_cyclic_clone_faults() {
        let s = Struct::new(Vec::new(), None);
        s.push(StackItem::Struct(s.clone())).unwrap();
        let err = s.clone_struct(&limits()).unwrap_err();
        assert_eq!(err.message(), "Beyond clone limits!");
        s.cleanup();
    }

    #[test]
    fn test_deep_equality_budget() {
        let mut limits = limits();
        limits.max_stack_size = 4;
        let build = || {
            Struct::new(
                (0..8).map(StackItem::from_int).collect(),
                None,
            )
        };
        let err = build()
            .equals(&StackItem::Struct(build()), &limits)
            .unwrap_err();
        assert_eq!(err.message(), "Too many struct items to compare.");
    }
}
