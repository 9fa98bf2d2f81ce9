//! Fail-fast enumerators.
//!
//! Each enumerator records a version stamp when it is created and checks it
//! before every step. On a mismatch it yields
//! `Some(Err(Error::ConcurrentModification))` once and is exhausted from then
//! on. Enumerators hold no borrow of the map between steps; they walk it by
//! position, which is sound because any change that could shift positions
//! also moves the stamp.
//!
//! Items are clones: the storage is shared, so references cannot outlive a
//! single step.

use crate::backing::BackingMap;
use crate::collection::ValueCollection;
use crate::error::{Error, Result};
use crate::map::Shared;
use crate::slot::Slot;
use crate::view::ValueView;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use std::rc::Rc;

/// Position over the attached keys (and over values within a key) plus the
/// stamp captured at creation.
struct Cursor<K, C, S> {
    shared: Shared<K, C, S>,
    version: u64,
    key_pos: usize,
    value_pos: usize,
    done: bool,
}

impl<K, C, S> Cursor<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    fn new(shared: Shared<K, C, S>) -> Self {
        let version = shared.borrow().version();
        Self {
            shared,
            version,
            key_pos: 0,
            value_pos: 0,
            done: false,
        }
    }

    /// Validate the stamp, then let `step` produce the next item. `step`
    /// returning `None` exhausts the cursor.
    fn advance<T>(
        &mut self,
        step: impl FnOnce(&BackingMap<K, C, S>, &mut usize, &mut usize) -> Option<T>,
    ) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        let map = self.shared.borrow();
        if map.version() != self.version {
            self.done = true;
            return Some(Err(Error::ConcurrentModification));
        }
        match step(&*map, &mut self.key_pos, &mut self.value_pos) {
            Some(item) => Some(Ok(item)),
            None => {
                self.done = true;
                None
            }
        }
    }

    /// Attached slot at the next key position.
    fn next_slot(&mut self) -> Option<Result<Rc<Slot<K, C>>>> {
        self.advance(|map, key_pos, _| {
            let slot = Rc::clone(map.slot_at(*key_pos)?);
            *key_pos += 1;
            Some(slot)
        })
    }

    fn remaining_keys(&self) -> usize {
        if self.done {
            return 0;
        }
        self.shared.borrow().len().saturating_sub(self.key_pos)
    }
}

/// Enumerator over the attached keys.
pub struct KeysIter<K, C, S> {
    cursor: Cursor<K, C, S>,
}

impl<K, C, S> KeysIter<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub(crate) fn new(shared: Shared<K, C, S>) -> Self {
        Self {
            cursor: Cursor::new(shared),
        }
    }
}

impl<K, C, S> Iterator for KeysIter<K, C, S>
where
    K: Eq + Hash + Clone,
    C: ValueCollection,
    S: BuildHasher,
{
    type Item = Result<K>;

    fn next(&mut self) -> Option<Result<K>> {
        self.cursor
            .next_slot()
            .map(|r| r.map(|slot| slot.key().clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // One extra for a possible error item.
        let n = self.cursor.remaining_keys();
        (0, Some(n + 1))
    }
}

impl<K, C, S> FusedIterator for KeysIter<K, C, S>
where
    K: Eq + Hash + Clone,
    C: ValueCollection,
    S: BuildHasher,
{
}

/// Enumerator over the attached per-key views.
pub struct CollectionsIter<K, C, S> {
    cursor: Cursor<K, C, S>,
}

impl<K, C, S> CollectionsIter<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub(crate) fn new(shared: Shared<K, C, S>) -> Self {
        Self {
            cursor: Cursor::new(shared),
        }
    }
}

impl<K, C, S> Iterator for CollectionsIter<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    type Item = Result<ValueView<K, C, S>>;

    fn next(&mut self) -> Option<Self::Item> {
        let shared = Rc::clone(&self.cursor.shared);
        self.cursor
            .next_slot()
            .map(|r| r.map(|slot| ValueView::new(shared, slot)))
    }
}

impl<K, C, S> FusedIterator for CollectionsIter<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
}

/// Enumerator over `(key, view)` pairs.
pub struct Iter<K, C, S> {
    cursor: Cursor<K, C, S>,
}

impl<K, C, S> Iter<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub(crate) fn new(shared: Shared<K, C, S>) -> Self {
        Self {
            cursor: Cursor::new(shared),
        }
    }
}

impl<K, C, S> Iterator for Iter<K, C, S>
where
    K: Eq + Hash + Clone,
    C: ValueCollection,
    S: BuildHasher,
{
    type Item = Result<(K, ValueView<K, C, S>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let shared = Rc::clone(&self.cursor.shared);
        self.cursor.next_slot().map(|r| {
            r.map(|slot| {
                let key = slot.key().clone();
                (key, ValueView::new(shared, slot))
            })
        })
    }
}

impl<K, C, S> FusedIterator for Iter<K, C, S>
where
    K: Eq + Hash + Clone,
    C: ValueCollection,
    S: BuildHasher,
{
}

/// Enumerator over every value: keys in map order, then each key's values
/// in their own order.
pub struct ValuesIter<K, C, S> {
    cursor: Cursor<K, C, S>,
}

impl<K, C, S> ValuesIter<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub(crate) fn new(shared: Shared<K, C, S>) -> Self {
        Self {
            cursor: Cursor::new(shared),
        }
    }
}

impl<K, C, S> Iterator for ValuesIter<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    C::Item: Clone,
    S: BuildHasher,
{
    type Item = Result<C::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.advance(|map, key_pos, value_pos| loop {
            let slot = map.slot_at(*key_pos)?;
            let values = slot.values();
            if let Some(v) = values.value_at(*value_pos) {
                *value_pos += 1;
                return Some(v.clone());
            }
            *key_pos += 1;
            *value_pos = 0;
        })
    }
}

impl<K, C, S> FusedIterator for ValuesIter<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    C::Item: Clone,
    S: BuildHasher,
{
}

/// Enumerator over one view's values, validated against that view's own
/// stamp.
pub struct ViewIter<K, C> {
    slot: Rc<Slot<K, C>>,
    version: u64,
    position: usize,
    done: bool,
}

impl<K, C: ValueCollection> ViewIter<K, C> {
    pub(crate) fn new(slot: Rc<Slot<K, C>>) -> Self {
        let version = slot.version();
        Self {
            slot,
            version,
            position: 0,
            done: false,
        }
    }
}

impl<K, C> Iterator for ViewIter<K, C>
where
    C: ValueCollection,
    C::Item: Clone,
{
    type Item = Result<C::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.slot.version() != self.version {
            self.done = true;
            return Some(Err(Error::ConcurrentModification));
        }
        let item = self.slot.values().value_at(self.position).cloned();
        match item {
            Some(v) => {
                self.position += 1;
                Some(Ok(v))
            }
            None => {
                self.done = true;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let n = self.slot.len().saturating_sub(self.position);
        (0, Some(n + 1))
    }
}

impl<K, C> FusedIterator for ViewIter<K, C>
where
    C: ValueCollection,
    C::Item: Clone,
{
}
