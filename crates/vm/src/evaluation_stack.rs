//! Evaluation stack module for the Neo Virtual Machine.
//!
//! This module represents a stack used by the Neo VM for executing scripts.
//! Indices passed to [`EvaluationStack::peek`], [`EvaluationStack::remove`]
//! and [`EvaluationStack::insert`] count from the top of the stack, and a
//! negative index counts from the bottom.

use crate::error::{VmError, VmResult};
use crate::reference_counter::ReferenceCounter;
use crate::stack_item::StackItem;
use std::fmt;

/// Represents the evaluation stack in the VM.
///
/// Every item entering the stack is reported to the reference counter as a
/// stack reference, and every item leaving it releases one. Dropping the
/// stack does not release anything: items left behind by an unloaded
/// context stay counted until the engine is dropped.
pub struct EvaluationStack {
    /// The underlying stack storage, bottom first
    stack: Vec<StackItem>,

    /// The reference counter for managing object lifetimes
    reference_counter: ReferenceCounter,
}

impl EvaluationStack {
    /// Creates a new evaluation stack with the specified reference counter.
    pub fn new(reference_counter: ReferenceCounter) -> Self {
        Self {
            stack: Vec::new(),
            reference_counter,
        }
    }

    /// Returns the reference counter for this evaluation stack.
    pub fn reference_counter(&self) -> &ReferenceCounter {
        &self.reference_counter
    }

    /// Pushes an item onto the stack.
    pub fn push(&mut self, item: StackItem) {
        self.reference_counter.add_stack_reference(&item);
        self.stack.push(item);
    }

    /// Pops an item from the stack.
    pub fn pop(&mut self) -> VmResult<StackItem> {
        self.remove(0)
    }

    /// Returns the item `index` positions below the top without removing it.
    pub fn peek(&self, index: isize) -> VmResult<&StackItem> {
        let position = self.position(index)?;
        Ok(&self.stack[position])
    }

    /// Returns the number of items on the stack.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns true if the stack is empty.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Removes the item `index` positions below the top.
    pub fn remove(&mut self, index: isize) -> VmResult<StackItem> {
        let position = self.position(index)?;
        let item = self.stack.remove(position);
        self.reference_counter.remove_stack_reference(&item);
        Ok(item)
    }

    /// Inserts an item so that it ends up `index` positions below the top.
    pub fn insert(&mut self, index: usize, item: StackItem) -> VmResult<()> {
        if index > self.stack.len() {
            return Err(VmError::invalid_operation_msg(format!(
                "Insert index is out of stack bounds: {index}/{}",
                self.stack.len()
            )));
        }
        self.reference_counter.add_stack_reference(&item);
        let position = self.stack.len() - index;
        self.stack.insert(position, item);
        Ok(())
    }

    /// Reverses the order of the top `n` items.
    pub fn reverse(&mut self, n: usize) -> VmResult<()> {
        if n > self.stack.len() {
            return Err(VmError::stack_underflow_msg(n, self.stack.len()));
        }
        if n <= 1 {
            return Ok(());
        }
        let start = self.stack.len() - n;
        self.stack[start..].reverse();
        Ok(())
    }

    /// Copies the top `count` items (all items when `None`) onto `target`,
    /// keeping their order. The copies are counted as new stack references.
    pub fn copy_to(&self, target: &mut EvaluationStack, count: Option<usize>) -> VmResult<()> {
        let start = self.start_of_top(count)?;
        for item in &self.stack[start..] {
            target.push(item.clone());
        }
        Ok(())
    }

    /// Moves the top `count` items (all items when `None`) onto `target`,
    /// keeping their order.
    pub fn move_to(&mut self, target: &mut EvaluationStack, count: Option<usize>) -> VmResult<()> {
        let start = self.start_of_top(count)?;
        let moved: Vec<StackItem> = self.stack.drain(start..).collect();
        let same_counter = self.reference_counter.ptr_eq(&target.reference_counter);
        for item in moved {
            if !same_counter {
                self.reference_counter.remove_stack_reference(&item);
                target.reference_counter.add_stack_reference(&item);
            }
            target.stack.push(item);
        }
        Ok(())
    }

    /// Removes every item from the stack.
    pub fn clear(&mut self) {
        for item in self.stack.drain(..) {
            self.reference_counter.remove_stack_reference(&item);
        }
    }

    /// Iterates from the top of the stack down.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &StackItem> + ExactSizeIterator {
        self.stack.iter().rev()
    }

    /// The items, bottom first.
    pub fn as_slice(&self) -> &[StackItem] {
        &self.stack
    }

    fn position(&self, index: isize) -> VmResult<usize> {
        let len = self.stack.len() as isize;
        let from_top = if index < 0 { index + len } else { index };
        if from_top < 0 || from_top >= len {
            return Err(VmError::stack_underflow_msg(
                index.unsigned_abs() + 1,
                self.stack.len(),
            ));
        }
        Ok((len - from_top - 1) as usize)
    }

    fn start_of_top(&self, count: Option<usize>) -> VmResult<usize> {
        let count = count.unwrap_or(self.stack.len());
        if count > self.stack.len() {
            return Err(VmError::stack_underflow_msg(count, self.stack.len()));
        }
        Ok(self.stack.len() - count)
    }
}

impl fmt::Debug for EvaluationStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stack.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn stack_of(values: &[i64]) -> EvaluationStack {
        let mut stack = EvaluationStack::new(ReferenceCounter::new());
        for value in values {
            stack.push(StackItem::from_int(*value));
        }
        stack
    }

    fn ints(stack: &EvaluationStack) -> Vec<BigInt> {
        stack.as_slice().iter().map(|i| i.as_int().unwrap()).collect()
    }

    #[test]
    fn test_push_pop_counts() {
        let mut stack = stack_of(&[1, 2, 3]);
        assert_eq!(stack.reference_counter().count(), 3);
        assert_eq!(stack.pop().unwrap().as_int().unwrap(), BigInt::from(3));
        assert_eq!(stack.reference_counter().count(), 2);
        stack.clear();
        assert!(stack.pop().is_err());
        assert_eq!(stack.reference_counter().count(), 0);
    }

    #[test]
    fn test_peek_from_top_and_bottom() {
        let stack = stack_of(&[1, 2, 3]);
        assert_eq!(stack.peek(0).unwrap().as_int().unwrap(), BigInt::from(3));
        assert_eq!(stack.peek(2).unwrap().as_int().unwrap(), BigInt::from(1));
        assert_eq!(stack.peek(-1).unwrap().as_int().unwrap(), BigInt::from(1));
        assert!(stack.peek(3).is_err());
        assert!(stack.peek(-4).is_err());
    }

    #[test]
    fn test_insert_remove() {
        let mut stack = stack_of(&[1, 3]);
        stack.insert(1, StackItem::from_int(2)).unwrap();
        assert_eq!(ints(&stack), vec![BigInt::from(1), BigInt::from(2), BigInt::from(3)]);
        assert!(stack.insert(4, StackItem::Null).is_err());

        let removed = stack.remove(1).unwrap();
        assert_eq!(removed.as_int().unwrap(), BigInt::from(2));
        assert_eq!(ints(&stack), vec![BigInt::from(1), BigInt::from(3)]);
    }

    #[test]
    fn test_reverse() {
        let mut stack = stack_of(&[1, 2, 3, 4, 5]);
        stack.reverse(3).unwrap();
        assert_eq!(
            ints(&stack),
            [1, 2, 5, 4, 3].into_iter().map(BigInt::from).collect::<Vec<_>>()
        );
        assert!(stack.reverse(6).is_err());
        stack.reverse(1).unwrap();
    }

    #[test]
    fn test_copy_and_move() {
        let mut source = stack_of(&[1, 2, 3]);
        let mut target = EvaluationStack::new(source.reference_counter().clone());

        source.copy_to(&mut target, Some(2)).unwrap();
        assert_eq!(ints(&target), vec![BigInt::from(2), BigInt::from(3)]);
        assert_eq!(source.reference_counter().count(), 5);

        source.move_to(&mut target, None).unwrap();
        assert!(source.is_empty());
        assert_eq!(target.len(), 5);
        assert_eq!(target.reference_counter().count(), 5);
        assert!(source.copy_to(&mut target, Some(1)).is_err());
    }
}
