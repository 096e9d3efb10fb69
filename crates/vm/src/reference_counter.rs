//! Reference counter module for the Neo Virtual Machine.
//!
//! The counter keeps the total number of references held by stacks, slots
//! and compound items. Buffers and compound items are additionally tracked
//! individually so that unreachable object graphs, cycles included, can be
//! found and subtracted lazily by [`ReferenceCounter::check_zero_referred`].

use crate::stack_item::StackItem;
use crate::strongly_connected_components::Tarjan;
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

struct TrackedEntry {
    item: StackItem,
    stack_references: usize,
    /// Parent compound id to the number of times the parent holds this item.
    object_references: HashMap<usize, usize>,
    on_stack: bool,
}

impl TrackedEntry {
    fn new(item: StackItem) -> Self {
        Self {
            item,
            stack_references: 0,
            object_references: HashMap::new(),
            on_stack: false,
        }
    }
}

#[derive(Default)]
struct CounterState {
    tracked_items: IndexMap<usize, TrackedEntry>,
    zero_referred: HashSet<usize>,
    cached_components: Option<Vec<Vec<usize>>>,
    references_count: usize,
}

impl CounterState {
    fn track(&mut self, id: usize, item: &StackItem) -> &mut TrackedEntry {
        self.tracked_items
            .entry(id)
            .or_insert_with(|| TrackedEntry::new(item.clone()))
    }
}

/// Counts references to stack items across one engine instance.
#[derive(Clone, Default)]
pub struct ReferenceCounter {
    inner: Rc<RefCell<CounterState>>,
}

/// A non-owning handle held by compound items so they can report changes
/// without keeping the counter alive.
#[derive(Clone)]
pub(crate) struct WeakReferenceCounter(Weak<RefCell<CounterState>>);

impl WeakReferenceCounter {
    pub(crate) fn upgrade(&self) -> Option<ReferenceCounter> {
        self.0.upgrade().map(|inner| ReferenceCounter { inner })
    }
}

impl ReferenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn downgrade(&self) -> WeakReferenceCounter {
        WeakReferenceCounter(Rc::downgrade(&self.inner))
    }

    /// Returns `true` if both handles refer to the same counter.
    pub fn ptr_eq(&self, other: &ReferenceCounter) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The current number of references, including those not yet swept.
    pub fn count(&self) -> usize {
        self.inner.borrow().references_count
    }

    /// Records that the compound `parent_id` now holds `item`.
    pub fn add_reference(&self, item: &StackItem, parent_id: usize) {
        let mut state = self.inner.borrow_mut();
        state.references_count += 1;
        let Some(id) = item.tracking_id() else {
            return;
        };
        state.cached_components = None;
        let entry = state.track(id, item);
        *entry.object_references.entry(parent_id).or_insert(0) += 1;
    }

    /// Records that the compound `parent_id` released one reference to `item`.
    pub fn remove_reference(&self, item: &StackItem, parent_id: usize) {
        let mut state = self.inner.borrow_mut();
        state.references_count = state.references_count.saturating_sub(1);
        let Some(id) = item.tracking_id() else {
            return;
        };
        state.cached_components = None;
        let mut zero = false;
        if let Some(entry) = state.tracked_items.get_mut(&id) {
            if let Some(refs) = entry.object_references.get_mut(&parent_id) {
                *refs = refs.saturating_sub(1);
            }
            zero = entry.stack_references == 0;
        }
        if zero {
            state.zero_referred.insert(id);
        }
    }

    pub fn add_stack_reference(&self, item: &StackItem) {
        self.add_stack_references(item, 1);
    }

    /// Records `count` stack or slot references to `item`.
    pub fn add_stack_references(&self, item: &StackItem, count: usize) {
        let mut state = self.inner.borrow_mut();
        state.references_count += count;
        let Some(id) = item.tracking_id() else {
            return;
        };
        if !state.tracked_items.contains_key(&id) {
            if let Some(components) = state.cached_components.as_mut() {
                components.push(vec![id]);
            }
        }
        state.track(id, item).stack_references += count;
        state.zero_referred.remove(&id);
    }

    pub fn remove_stack_reference(&self, item: &StackItem) {
        let mut state = self.inner.borrow_mut();
        state.references_count = state.references_count.saturating_sub(1);
        let Some(id) = item.tracking_id() else {
            return;
        };
        let mut zero = false;
        if let Some(entry) = state.tracked_items.get_mut(&id) {
            entry.stack_references = entry.stack_references.saturating_sub(1);
            zero = entry.stack_references == 0;
        }
        if zero {
            state.zero_referred.insert(id);
        }
    }

    /// Registers a freshly created compound item that nothing references yet.
    pub fn add_zero_referred(&self, item: &StackItem) {
        let Some(id) = item.tracking_id() else {
            return;
        };
        let mut state = self.inner.borrow_mut();
        state.zero_referred.insert(id);
        if !state.tracked_items.contains_key(&id) {
            if let Some(components) = state.cached_components.as_mut() {
                components.push(vec![id]);
            }
            state.track(id, item);
        }
    }

    /// Sweeps every tracked item that is no longer reachable from a stack
    /// and returns the exact reference count.
    ///
    /// The contents of unreachable cyclic compounds are released so that
    /// their shared allocations can be freed.
    pub fn check_zero_referred(&self) -> usize {
        let mut garbage = Vec::new();
        let count = {
            let mut state = self.inner.borrow_mut();
            if !state.zero_referred.is_empty() {
                state.zero_referred.clear();
                Self::sweep(&mut state, &mut garbage);
            }
            state.references_count
        };
        let freed = garbage.len();
        drop(garbage);
        if freed > 0 {
            log::trace!("reference counter released {freed} cyclic items, {count} references remain");
        }
        count
    }

    /// Empties every tracked compound that sits on a cycle nothing outside
    /// the counter can reach any more, then forgets all tracked items.
    /// Called when the owning engine goes away, after its own stacks have
    /// been released. Items the host still holds keep their contents.
    pub(crate) fn release_cycles(&self) {
        let garbage = {
            let mut state = self.inner.borrow_mut();
            let held = Self::externally_reachable(&state.tracked_items);
            let components = Self::components(&state.tracked_items);
            let mut garbage = Vec::new();
            for component in &components {
                if component.iter().any(|id| held.contains(id)) {
                    continue;
                }
                if Self::is_cyclic(&state.tracked_items, component) {
                    for id in component {
                        if let Some(entry) = state.tracked_items.get(id) {
                            garbage.extend(entry.item.cleanup());
                        }
                    }
                }
            }
            state.tracked_items.clear();
            state.zero_referred.clear();
            state.cached_components = None;
            garbage
        };
        if !garbage.is_empty() {
            log::trace!("reference counter released {} items held by cycles", garbage.len());
        }
    }

    /// Ids of tracked items held by someone other than the counter and the
    /// tracked compounds, together with everything reachable from them.
    fn externally_reachable(tracked: &IndexMap<usize, TrackedEntry>) -> HashSet<usize> {
        let mut internal: HashMap<usize, usize> = HashMap::new();
        for entry in tracked.values() {
            for sub_item in entry.item.sub_items() {
                if let Some(id) = sub_item.tracking_id() {
                    *internal.entry(id).or_insert(0) += 1;
                }
            }
        }

        // One handle per item belongs to the counter's own entry.
        let mut pending: Vec<usize> = tracked
            .iter()
            .filter(|(id, entry)| {
                let internal = internal.get(*id).copied().unwrap_or(0);
                entry
                    .item
                    .handle_count()
                    .is_some_and(|handles| handles > internal + 1)
            })
            .map(|(id, _)| *id)
            .collect();

        let mut reachable = HashSet::new();
        while let Some(id) = pending.pop() {
            if !reachable.insert(id) {
                continue;
            }
            let Some(entry) = tracked.get(&id) else {
                continue;
            };
            for sub_item in entry.item.sub_items() {
                if let Some(sub_id) = sub_item.tracking_id() {
                    if !reachable.contains(&sub_id) {
                        pending.push(sub_id);
                    }
                }
            }
        }
        reachable
    }

    fn components(tracked: &IndexMap<usize, TrackedEntry>) -> Vec<Vec<usize>> {
        Tarjan::new(|id: usize| {
            tracked
                .get(&id)
                .map(|entry| {
                    entry
                        .object_references
                        .iter()
                        .filter(|(parent, refs)| **refs > 0 && tracked.contains_key(*parent))
                        .map(|(parent, _)| *parent)
                        .collect()
                })
                .unwrap_or_default()
        })
        .invoke(tracked.keys().copied().collect::<Vec<_>>())
    }

    fn is_cyclic(tracked: &IndexMap<usize, TrackedEntry>, component: &[usize]) -> bool {
        match component {
            [single] => tracked
                .get(single)
                .and_then(|entry| entry.object_references.get(single))
                .is_some_and(|refs| *refs > 0),
            _ => component.len() > 1,
        }
    }

    fn sweep(state: &mut CounterState, garbage: &mut Vec<StackItem>) {
        let components = match state.cached_components.take() {
            Some(components) => components,
            None => Self::components(&state.tracked_items),
        };

        for entry in state.tracked_items.values_mut() {
            entry.on_stack = false;
        }

        let mut retained = Vec::with_capacity(components.len());
        for component in components {
            let on_stack = component.iter().any(|id| {
                state.tracked_items.get(id).is_some_and(|entry| {
                    entry.stack_references > 0
                        || entry.object_references.iter().any(|(parent, refs)| {
                            *refs > 0
                                && state
                                    .tracked_items
                                    .get(parent)
                                    .is_some_and(|p| p.on_stack)
                        })
                })
            });

            if on_stack {
                for id in &component {
                    if let Some(entry) = state.tracked_items.get_mut(id) {
                        entry.on_stack = true;
                    }
                }
                retained.push(component);
                continue;
            }

            let members: HashSet<usize> = component.iter().copied().collect();
            let cyclic = Self::is_cyclic(&state.tracked_items, &component);

            for id in &component {
                let Some(entry) = state.tracked_items.swap_remove(id) else {
                    continue;
                };
                let sub_items = entry.item.sub_items();
                state.references_count = state.references_count.saturating_sub(sub_items.len());
                for sub_item in &sub_items {
                    let Some(sub_id) = sub_item.tracking_id() else {
                        continue;
                    };
                    if members.contains(&sub_id) {
                        continue;
                    }
                    if let Some(sub_entry) = state.tracked_items.get_mut(&sub_id) {
                        sub_entry.object_references.remove(id);
                    }
                }
                if cyclic {
                    garbage.extend(entry.item.cleanup());
                }
                garbage.push(entry.item);
            }
        }

        state.cached_components = Some(retained);
    }
}

impl fmt::Debug for ReferenceCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("ReferenceCounter")
            .field("count", &state.references_count)
            .field("tracked", &state.tracked_items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack_item::{Array, Buffer, Map, PrimitiveType, Struct};

    #[test]
    fn test_primitives_are_counted_not_tracked() {
        let rc = ReferenceCounter::new();
        let one = StackItem::from_int(1);
        rc.add_stack_reference(&one);
        rc.add_stack_reference(&one);
        assert_eq!(rc.count(), 2);
        rc.remove_stack_reference(&one);
        assert_eq!(rc.check_zero_referred(), 1);
    }

    #[test]
    fn test_array_children_count() {
        let rc = ReferenceCounter::new();
        let array = Array::new(
            vec![StackItem::from_int(1), StackItem::from_int(2)],
            Some(&rc),
        );
        let item = StackItem::Array(array.clone());
        rc.add_stack_reference(&item);
        assert_eq!(rc.check_zero_referred(), 3);

        array.push(StackItem::from_bool(true)).unwrap();
        assert_eq!(rc.count(), 4);

        rc.remove_stack_reference(&item);
        assert_eq!(rc.check_zero_referred(), 0);
    }

    #[test]
    fn test_unreachable_cycle_is_released() {
        let rc = ReferenceCounter::new();
        let a = Array::new(Vec::new(), Some(&rc));
        let b = Array::new(Vec::new(), Some(&rc));
        a.push(StackItem::Array(b.clone())).unwrap();
        b.push(StackItem::Array(a.clone())).unwrap();

        let root = StackItem::Array(a.clone());
        rc.add_stack_reference(&root);
        assert_eq!(rc.check_zero_referred(), 3);

        rc.remove_stack_reference(&root);
        assert_eq!(rc.check_zero_referred(), 0);
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn test_reachable_through_parent_is_kept() {
        let rc = ReferenceCounter::new();
        let inner = Struct::new(vec![StackItem::from_int(7)], Some(&rc));
        let outer = Array::new(vec![StackItem::Struct(inner.clone())], Some(&rc));
        let root = StackItem::Array(outer);
        rc.add_stack_reference(&root);
        assert_eq!(rc.check_zero_referred(), 3);
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn test_map_counts_keys_and_values() {
        let rc = ReferenceCounter::new();
        let map = Map::new(Some(&rc));
        map.set(PrimitiveType::from(1), StackItem::from_int(10)).unwrap();
        map.set(PrimitiveType::from(2), StackItem::from_int(20)).unwrap();
        let root = StackItem::Map(map.clone());
        rc.add_stack_reference(&root);
        assert_eq!(rc.check_zero_referred(), 5);

        map.set(PrimitiveType::from(1), StackItem::from_int(11)).unwrap();
        assert_eq!(rc.count(), 5);
        map.remove(&PrimitiveType::from(2)).unwrap();
        assert_eq!(rc.count(), 3);
    }

    #[test]
    fn test_release_cycles_keeps_acyclic_items() {
        let rc = ReferenceCounter::new();
        let buffer = Buffer::new(vec![1]);
        {
            let cyclic = Array::new(vec![StackItem::Buffer(buffer.clone())], Some(&rc));
            cyclic.push(StackItem::Array(cyclic.clone())).unwrap();
        }
        let plain = Array::new(vec![StackItem::from_int(1)], Some(&rc));
        rc.add_stack_reference(&StackItem::Array(plain.clone()));
        assert_eq!(buffer.handle_count(), 3);

        rc.release_cycles();
        assert_eq!(buffer.handle_count(), 1);
        assert_eq!(plain.len(), 1);
    }

    #[test]
    fn test_release_cycles_spares_held_cycles() {
        let rc = ReferenceCounter::new();
        let held = Array::new(Vec::new(), Some(&rc));
        held.push(StackItem::Array(held.clone())).unwrap();
        let inner = Map::new(Some(&rc));
        inner
            .set(PrimitiveType::from(1), StackItem::Map(inner.clone()))
            .unwrap();
        held.push(StackItem::Map(inner.clone())).unwrap();
        drop(inner);

        rc.release_cycles();
        assert_eq!(held.len(), 2);
        let StackItem::Map(inner) = held.get(1).unwrap() else {
            panic!("expected a map");
        };
        assert_eq!(inner.len(), 1);
    }
}
