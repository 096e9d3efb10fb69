//! Slot storage for local variables, arguments and static fields.
//!
//! A slot owns a fixed-size collection of [`StackItem`]s and keeps the VM
//! reference counter in sync whenever the slot content changes.

use crate::error::{VmError, VmResult};
use crate::reference_counter::ReferenceCounter;
use crate::stack_item::StackItem;
use std::fmt;

/// Stores local variables, arguments or static fields for a single execution context.
pub struct Slot {
    items: Vec<StackItem>,
    reference_counter: ReferenceCounter,
}

impl Slot {
    /// Creates a slot populated with the provided items.
    pub fn new(items: Vec<StackItem>, reference_counter: ReferenceCounter) -> Self {
        for item in &items {
            reference_counter.add_stack_reference(item);
        }
        Self {
            items,
            reference_counter,
        }
    }

    /// Creates a slot of the requested size initialised with `Null`.
    pub fn with_count(count: usize, reference_counter: ReferenceCounter) -> Self {
        reference_counter.add_stack_references(&StackItem::Null, count);
        Self {
            items: vec![StackItem::Null; count],
            reference_counter,
        }
    }

    /// Returns the number of elements stored in the slot.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when the slot does not contain any items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> VmResult<&StackItem> {
        self.items
            .get(index)
            .ok_or_else(|| self.index_out_of_range(index))
    }

    /// Replaces the item stored at `index`, updating reference counters accordingly.
    pub fn set(&mut self, index: usize, item: StackItem) -> VmResult<()> {
        let len = self.items.len();
        let slot = self.items.get_mut(index).ok_or_else(|| {
            VmError::index_out_of_range_msg(format!(
                "Index {index} out of range for slot of size {len}"
            ))
        })?;
        self.reference_counter.add_stack_reference(&item);
        let old = std::mem::replace(slot, item);
        self.reference_counter.remove_stack_reference(&old);
        Ok(())
    }

    /// Releases the stack reference held for every item and empties the slot.
    pub fn clear_references(&mut self) {
        for item in self.items.drain(..) {
            self.reference_counter.remove_stack_reference(&item);
        }
    }

    /// Returns an iterator over the contained items.
    pub fn iter(&self) -> impl Iterator<Item = &StackItem> {
        self.items.iter()
    }

    fn index_out_of_range(&self, index: usize) -> VmError {
        VmError::index_out_of_range_msg(format!(
            "Index {index} out of range for slot of size {}",
            self.items.len()
        ))
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn test_with_count_fills_null() {
        let rc = ReferenceCounter::new();
        let slot = Slot::with_count(3, rc.clone());
        assert_eq!(slot.len(), 3);
        assert!(slot.iter().all(StackItem::is_null));
        assert_eq!(rc.count(), 3);
        assert!(slot.get(3).is_err());
    }

    #[test]
    fn test_set_replaces_reference() {
        let rc = ReferenceCounter::new();
        let mut slot = Slot::new(vec![StackItem::from_int(1), StackItem::from_int(2)], rc.clone());
        slot.set(0, StackItem::from_int(5)).unwrap();
        assert_eq!(slot.get(0).unwrap().as_int().unwrap(), BigInt::from(5));
        assert_eq!(rc.count(), 2);
        assert!(slot.set(2, StackItem::Null).is_err());
    }

    #[test]
    fn test_clear_references() {
        let rc = ReferenceCounter::new();
        let mut slot = Slot::with_count(4, rc.clone());
        slot.clear_references();
        assert!(slot.is_empty());
        assert_eq!(rc.count(), 0);
    }
}
