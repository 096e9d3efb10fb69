//! Array stack item implementation for the Neo Virtual Machine.
//!
//! An [`Array`] is a shared, mutable list. Cloning the handle aliases the
//! same list; every mutation is reported to the owning reference counter.

use crate::error::{VmError, VmResult};
use crate::reference_counter::{ReferenceCounter, WeakReferenceCounter};
use crate::stack_item::{next_tracking_id, StackItem};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

struct ArrayInner {
    id: usize,
    items: RefCell<Vec<StackItem>>,
    read_only: Cell<bool>,
    reference_counter: Option<WeakReferenceCounter>,
}

/// Represents an array of stack items in the VM.
#[derive(Clone)]
pub struct Array {
    inner: Rc<ArrayInner>,
}

impl Array {
    /// Creates a new array holding `items`, registered with `reference_counter` if given.
    pub fn new(items: Vec<StackItem>, reference_counter: Option<&ReferenceCounter>) -> Self {
        let array = Self::detached(reference_counter);
        array.attach(&StackItem::Array(array.clone()), items, reference_counter);
        array
    }

    /// An empty array not yet registered with its counter.
    pub(crate) fn detached(reference_counter: Option<&ReferenceCounter>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                id: next_tracking_id(),
                items: RefCell::new(Vec::new()),
                read_only: Cell::new(false),
                reference_counter: reference_counter.map(ReferenceCounter::downgrade),
            }),
        }
    }

    pub(crate) fn attach(
        &self,
        as_item: &StackItem,
        items: Vec<StackItem>,
        reference_counter: Option<&ReferenceCounter>,
    ) {
        if let Some(rc) = reference_counter {
            rc.add_zero_referred(as_item);
            for item in &items {
                rc.add_reference(item, self.id());
            }
        }
        *self.inner.items.borrow_mut() = items;
    }

    /// The identity used by the reference counter.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// The counter this array reports to, if it is still alive.
    pub fn reference_counter(&self) -> Option<ReferenceCounter> {
        self.inner
            .reference_counter
            .as_ref()
            .and_then(WeakReferenceCounter::upgrade)
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns a clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<StackItem> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Returns a snapshot of the items.
    pub fn items(&self) -> Vec<StackItem> {
        self.inner.items.borrow().clone()
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only.get()
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.inner.read_only.set(read_only);
    }

    fn check_writable(&self) -> VmResult<()> {
        if self.is_read_only() {
            return Err(VmError::invalid_operation_msg("The object is readonly."));
        }
        Ok(())
    }

    /// Replaces the item at `index`.
    pub fn set(&self, index: usize, item: StackItem) -> VmResult<()> {
        self.check_writable()?;
        let old = {
            let mut items = self.inner.items.borrow_mut();
            let len = items.len();
            let slot = items.get_mut(index).ok_or_else(|| {
                VmError::index_out_of_range_msg(format!("Index {index} out of range for {len} items"))
            })?;
            std::mem::replace(slot, item.clone())
        };
        if let Some(rc) = self.reference_counter() {
            rc.remove_reference(&old, self.id());
            rc.add_reference(&item, self.id());
        }
        Ok(())
    }

    /// Appends an item.
    pub fn push(&self, item: StackItem) -> VmResult<()> {
        self.check_writable()?;
        if let Some(rc) = self.reference_counter() {
            rc.add_reference(&item, self.id());
        }
        self.inner.items.borrow_mut().push(item);
        Ok(())
    }

    /// Removes and returns the item at `index`.
    pub fn remove_at(&self, index: usize) -> VmResult<StackItem> {
        self.check_writable()?;
        let removed = {
            let mut items = self.inner.items.borrow_mut();
            if index >= items.len() {
                return Err(VmError::index_out_of_range_msg(format!(
                    "Index {index} out of range for {} items",
                    items.len()
                )));
            }
            items.remove(index)
        };
        if let Some(rc) = self.reference_counter() {
            rc.remove_reference(&removed, self.id());
        }
        Ok(removed)
    }

    /// Appends while bypassing the read-only flag, for copies under construction.
    pub(crate) fn append_unchecked(&self, item: StackItem) {
        if let Some(rc) = self.reference_counter() {
            rc.add_reference(&item, self.id());
        }
        self.inner.items.borrow_mut().push(item);
    }

    pub fn clear(&self) -> VmResult<()> {
        self.check_writable()?;
        let removed = std::mem::take(&mut *self.inner.items.borrow_mut());
        if let Some(rc) = self.reference_counter() {
            for item in &removed {
                rc.remove_reference(item, self.id());
            }
        }
        Ok(())
    }

    pub fn reverse(&self) -> VmResult<()> {
        self.check_writable()?;
        self.inner.items.borrow_mut().reverse();
        Ok(())
    }

    /// Returns `true` if both handles refer to the same array.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The number of live handles sharing this array's storage.
    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Takes the items out without reporting to the counter. Only the
    /// counter calls this, for arrays it has already written off.
    pub(crate) fn cleanup(&self) -> Vec<StackItem> {
        std::mem::take(&mut *self.inner.items.borrow_mut())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.items.try_borrow() {
            Ok(items) => write!(f, "Array#{}(len {})", self.id(), items.len()),
            Err(_) => write!(f, "Array#{}", self.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_alias() {
        let a = Array::new(vec![StackItem::from_int(1)], None);
        let b = a.clone();
        b.push(StackItem::from_int(2)).unwrap();
        assert_eq!(a.len(), 2);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Array::new(Vec::new(), None)));
    }

    #[test]
    fn test_read_only_rejects_mutation() {
        let a = Array::new(vec![StackItem::from_int(1)], None);
        a.set_read_only(true);
        let err = a.push(StackItem::Null).unwrap_err();
        assert_eq!(err.message(), "The object is readonly.");
        assert!(a.set(0, StackItem::Null).is_err());
        assert!(a.clear().is_err());
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_remove_at_and_reverse() {
        let a = Array::new(
            (1..=3).map(StackItem::from_int).collect(),
            None,
        );
        a.reverse().unwrap();
        let removed = a.remove_at(0).unwrap();
        assert_eq!(removed.as_int().unwrap(), num_bigint::BigInt::from(3));
        assert!(a.remove_at(5).is_err());
        assert_eq!(a.len(), 2);
    }
}
