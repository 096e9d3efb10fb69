//! Map stack item implementation for the Neo Virtual Machine.

use crate::error::{VmError, VmResult};
use crate::reference_counter::{ReferenceCounter, WeakReferenceCounter};
use crate::stack_item::{next_tracking_id, PrimitiveType, StackItem};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

struct MapInner {
    id: usize,
    entries: RefCell<IndexMap<PrimitiveType, StackItem>>,
    read_only: Cell<bool>,
    reference_counter: Option<WeakReferenceCounter>,
}

/// An insertion-ordered dictionary from primitive keys to stack items.
#[derive(Clone)]
pub struct Map {
    inner: Rc<MapInner>,
}

impl Map {
    /// The largest key, in bytes.
    pub const MAX_KEY_SIZE: usize = 64;

    /// Creates an empty map registered with `reference_counter` if given.
    pub fn new(reference_counter: Option<&ReferenceCounter>) -> Self {
        let map = Self {
            inner: Rc::new(MapInner {
                id: next_tracking_id(),
                entries: RefCell::new(IndexMap::new()),
                read_only: Cell::new(false),
                reference_counter: reference_counter.map(ReferenceCounter::downgrade),
            }),
        };
        if let Some(rc) = reference_counter {
            rc.add_zero_referred(&StackItem::Map(map.clone()));
        }
        map
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn reference_counter(&self) -> Option<ReferenceCounter> {
        self.inner
            .reference_counter
            .as_ref()
            .and_then(WeakReferenceCounter::upgrade)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
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

    fn check_key(key: &PrimitiveType) -> VmResult<()> {
        if key.size() > Self::MAX_KEY_SIZE {
            return Err(VmError::invalid_operation_msg(format!(
                "MaxKeySize exceed: {}",
                key.size()
            )));
        }
        Ok(())
    }

    /// Looks up `key`. Keys above `MAX_KEY_SIZE` are rejected, not just missing.
    pub fn get(&self, key: &PrimitiveType) -> VmResult<Option<StackItem>> {
        Self::check_key(key)?;
        Ok(self.inner.entries.borrow().get(key).cloned())
    }

    pub fn contains_key(&self, key: &PrimitiveType) -> VmResult<bool> {
        Self::check_key(key)?;
        Ok(self.inner.entries.borrow().contains_key(key))
    }

    /// Inserts or replaces the value stored under `key`. Replacing keeps the key's position.
    pub fn set(&self, key: PrimitiveType, value: StackItem) -> VmResult<()> {
        Self::check_key(&key)?;
        self.check_writable()?;
        self.insert_unchecked(key, value);
        Ok(())
    }

    /// Inserts while bypassing the read-only flag, for copies under construction.
    pub(crate) fn insert_unchecked(&self, key: PrimitiveType, value: StackItem) {
        let key_item = key.to_stack_item();
        let old = self.inner.entries.borrow_mut().insert(key, value.clone());
        if let Some(rc) = self.reference_counter() {
            match &old {
                Some(old_value) => rc.remove_reference(old_value, self.id()),
                None => rc.add_reference(&key_item, self.id()),
            }
            rc.add_reference(&value, self.id());
        }
    }

    /// Removes `key`, returning its value. Later entries keep their relative order.
    pub fn remove(&self, key: &PrimitiveType) -> VmResult<Option<StackItem>> {
        Self::check_key(key)?;
        self.check_writable()?;
        let removed = self.inner.entries.borrow_mut().shift_remove(key);
        if let (Some(value), Some(rc)) = (&removed, self.reference_counter()) {
            rc.remove_reference(&key.to_stack_item(), self.id());
            rc.remove_reference(value, self.id());
        }
        Ok(removed)
    }

    pub fn clear(&self) -> VmResult<()> {
        self.check_writable()?;
        let removed = std::mem::take(&mut *self.inner.entries.borrow_mut());
        if let Some(rc) = self.reference_counter() {
            for (key, value) in &removed {
                rc.remove_reference(&key.to_stack_item(), self.id());
                rc.remove_reference(value, self.id());
            }
        }
        Ok(())
    }

    pub fn keys(&self) -> Vec<PrimitiveType> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<StackItem> {
        self.inner.entries.borrow().values().cloned().collect()
    }

    /// Returns a snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(PrimitiveType, StackItem)> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &Map) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Keys and values, as counted by the reference counter.
    pub(crate) fn sub_items(&self) -> Vec<StackItem> {
        let entries = self.inner.entries.borrow();
        entries
            .keys()
            .map(PrimitiveType::to_stack_item)
            .chain(entries.values().cloned())
            .collect()
    }

    pub(crate) fn cleanup(&self) -> Vec<StackItem> {
        std::mem::take(&mut *self.inner.entries.borrow_mut())
            .into_values()
            .collect()
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.entries.try_borrow() {
            Ok(entries) => write!(f, "Map#{}(len {})", self.id(), entries.len()),
            Err(_) => write!(f, "Map#{}", self.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_survives_overwrite_and_remove() {
        let map = Map::new(None);
        map.set(PrimitiveType::from("a"), StackItem::from_int(1)).unwrap();
        map.set(PrimitiveType::from("b"), StackItem::from_int(2)).unwrap();
        map.set(PrimitiveType::from("c"), StackItem::from_int(3)).unwrap();
        map.set(PrimitiveType::from("a"), StackItem::from_int(4)).unwrap();
        map.remove(&PrimitiveType::from("b")).unwrap();

        assert_eq!(
            map.keys(),
            vec![PrimitiveType::from("a"), PrimitiveType::from("c")]
        );
        assert_eq!(
            map.get(&PrimitiveType::from("a"))
                .unwrap()
                .unwrap()
                .as_int()
                .unwrap(),
            num_bigint::BigInt::from(4)
        );
    }

    #[test]
    fn test_key_size_limit() {
        let map = Map::new(None);
        let big = PrimitiveType::from(&[0u8; 65][..]);
        let err = map.set(big, StackItem::Null).unwrap_err();
        assert_eq!(err.message(), "MaxKeySize exceed: 65");
        assert!(map
            .set(PrimitiveType::from(&[0u8; 64][..]), StackItem::Null)
            .is_ok());
    }

    #[test]
    fn test_read_only() {
        let map = Map::new(None);
        map.set_read_only(true);
        assert!(map.set(PrimitiveType::from(1), StackItem::Null).is_err());
    }
}
