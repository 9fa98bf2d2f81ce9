//! MultiMap: the public dictionary engine over a shared `BackingMap`.

use crate::aggregate::{CollectionsView, KeysView, ValuesView};
use crate::alternate::{AlternateKey, AlternateLookup};
use crate::backing::BackingMap;
use crate::collection::{UniqueSet, ValueCollection};
use crate::error::{check_index, Error, Result};
use crate::iter::Iter;
use crate::read_only::ReadOnly;
use crate::view::ValueView;
use core::cell::{OnceCell, RefCell};
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::rc::Rc;

/// Backing map shared by a `MultiMap` and every view handed out for it.
pub(crate) type Shared<K, C, S> = Rc<RefCell<BackingMap<K, C, S>>>;

/// Map from each key to a live collection of values.
///
/// A key is present iff its collection is non-empty. Views obtained from the
/// map read and write through to it; aggregate views and enumerators never
/// copy. All methods take `&self`: the map is single-threaded and uses
/// interior mutability, like the views it hands out.
pub struct MultiMap<K, C, S = RandomState> {
    shared: Shared<K, C, S>,
    keys: OnceCell<KeysView<K, C, S>>,
    collections: OnceCell<CollectionsView<K, C, S>>,
    values: OnceCell<ValuesView<K, C, S>>,
}

/// Values per key kept in insertion order, duplicates allowed.
pub type ListMultiMap<K, V, S = RandomState> = MultiMap<K, Vec<V>, S>;

/// Values per key kept unique.
pub type SetMultiMap<K, V, S = RandomState> = MultiMap<K, UniqueSet<V>, S>;

impl<K, C> MultiMap<K, C>
where
    K: Eq + Hash,
    C: ValueCollection,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K, C, S> Default for MultiMap<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, C, S> MultiMap<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            shared: Rc::new(RefCell::new(BackingMap::with_capacity_and_hasher(
                capacity, hasher,
            ))),
            keys: OnceCell::new(),
            collections: OnceCell::new(),
            values: OnceCell::new(),
        }
    }

    pub(crate) fn shared(&self) -> &Shared<K, C, S> {
        &self.shared
    }

    fn view_of(&self, slot: Rc<crate::slot::Slot<K, C>>) -> ValueView<K, C, S> {
        ValueView::new(Rc::clone(&self.shared), slot)
    }

    /// Number of keys (equivalently, of non-empty collections).
    pub fn len(&self) -> usize {
        self.shared.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.borrow().is_empty()
    }

    /// Total number of values across all keys.
    pub fn value_count(&self) -> usize {
        self.shared.borrow().value_count()
    }

    /// Stamp moved by every structural mutation since construction.
    pub fn version(&self) -> u64 {
        self.shared.borrow().version()
    }

    /// The collection for `key`. Never fails: an absent key yields an empty
    /// detached view that attaches itself on its first insertion.
    pub fn view(&self, key: K) -> ValueView<K, C, S> {
        let slot = self.shared.borrow().slot_for(key);
        self.view_of(slot)
    }

    /// The collection for `key` if the key is present.
    pub fn try_get_values<Q>(&self, key: &Q) -> Option<ValueView<K, C, S>>
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.shared.borrow().find(key).map(Rc::clone)?;
        Some(self.view_of(slot))
    }

    /// Add `value` under `key`. Returns false when the collection rejected it
    /// (duplicate in a set).
    pub fn add(&self, key: K, value: C::Item) -> bool {
        let mut map = self.shared.borrow_mut();
        let slot = map.slot_for(key);
        map.edit_slot(&slot, |c| c.insert_value(value))
    }

    /// Add every value under `key` as one logical operation. An empty input
    /// on an absent key changes nothing and yields `None`.
    pub fn add_range<I>(&self, key: K, values: I) -> Option<ValueView<K, C, S>>
    where
        I: IntoIterator<Item = C::Item>,
    {
        let incoming: Vec<C::Item> = values.into_iter().collect();
        let mut map = self.shared.borrow_mut();
        let slot = map.slot_for(key);
        if incoming.is_empty() && !slot.is_attached() {
            return None;
        }
        map.edit_slot(&slot, |c| {
            c.reserve(incoming.len());
            for v in incoming {
                c.insert_value(v);
            }
        });
        drop(map);
        Some(self.view_of(slot))
    }

    /// Replace the collection for `key` wholesale. An empty replacement
    /// removes the key. Returns the view when the key is present afterwards.
    pub fn set_range<I>(&self, key: K, values: I) -> Option<ValueView<K, C, S>>
    where
        I: IntoIterator<Item = C::Item>,
    {
        let incoming: Vec<C::Item> = values.into_iter().collect();
        let mut map = self.shared.borrow_mut();
        let slot = map.slot_for(key);
        if incoming.is_empty() && !slot.is_attached() {
            return None;
        }
        let (_, before, after) = slot.edit(|c| {
            c.clear_values();
            c.reserve(incoming.len());
            for v in incoming {
                c.insert_value(v);
            }
        });
        map.settle(&slot, before, after, true);
        let present = slot.is_attached();
        drop(map);
        present.then(|| self.view_of(slot))
    }

    /// Remove `key` and its whole collection. Views still holding the removed
    /// collection keep its contents but no longer affect the map.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut map = self.shared.borrow_mut();
        let Some(slot) = map.find(key).map(Rc::clone) else {
            return false;
        };
        map.remove_slot(&slot) > 0
    }

    /// Remove one occurrence of `value` under `key`; the key goes away with
    /// its last value.
    pub fn remove_value<Q>(&self, key: &Q, value: &C::Item) -> bool
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut map = self.shared.borrow_mut();
        let Some(slot) = map.find(key).map(Rc::clone) else {
            return false;
        };
        map.edit_slot(&slot, |c| c.remove_value(value))
    }

    /// Empty every collection and remove every key.
    pub fn clear(&self) {
        self.shared.borrow_mut().clear()
    }

    /// Empty the collection for `key`. Returns false when the key was absent.
    pub fn clear_key<Q>(&self, key: &Q) -> bool
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut map = self.shared.borrow_mut();
        let Some(slot) = map.find(key).map(Rc::clone) else {
            return false;
        };
        map.edit_slot(&slot, |c| c.clear_values());
        true
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shared.borrow().contains_key(key)
    }

    pub fn contains<Q>(&self, key: &Q, value: &C::Item) -> bool
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shared
            .borrow()
            .find(key)
            .is_some_and(|slot| slot.values().contains_value(value))
    }

    /// Whether any key holds `value`. Linear in the number of keys.
    pub fn contains_value(&self, value: &C::Item) -> bool {
        self.shared
            .borrow()
            .slots()
            .any(|slot| slot.values().contains_value(value))
    }

    /// Number of values under `key` (0 when absent).
    pub fn value_count_of<Q>(&self, key: &Q) -> usize
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shared.borrow().find(key).map_or(0, |slot| slot.len())
    }

    /// Memoized read-through view of the keys.
    pub fn keys(&self) -> &KeysView<K, C, S> {
        self.keys
            .get_or_init(|| KeysView::new(Rc::clone(&self.shared)))
    }

    /// Memoized read-through view of the per-key collections.
    pub fn collections(&self) -> &CollectionsView<K, C, S> {
        self.collections
            .get_or_init(|| CollectionsView::new(Rc::clone(&self.shared)))
    }

    /// Memoized read-through view of every value, flattened.
    pub fn values(&self) -> &ValuesView<K, C, S> {
        self.values
            .get_or_init(|| ValuesView::new(Rc::clone(&self.shared)))
    }

    /// Fail-fast enumerator over `(key, view)` pairs.
    pub fn iter(&self) -> Iter<K, C, S> {
        Iter::new(Rc::clone(&self.shared))
    }

    /// Lookup by a non-canonical key representation, using `comparer` for
    /// every call made through the returned accessor.
    pub fn alternate_lookup<A>(&self, comparer: A) -> AlternateLookup<'_, K, C, S, A>
    where
        A: AlternateKey<K>,
    {
        AlternateLookup::new(self, comparer)
    }

    /// A façade exposing only the non-mutating operations of this map.
    pub fn read_only(&self) -> ReadOnly<&Self> {
        ReadOnly::new(self)
    }

    /// Number of keys the map can hold without reallocating its index.
    pub fn capacity(&self) -> usize {
        self.shared.borrow().capacity()
    }

    pub fn reserve(&self, additional: usize) {
        self.shared.borrow_mut().reserve(additional)
    }

    pub fn shrink_to_fit(&self) {
        let mut map = self.shared.borrow_mut();
        let len = map.len();
        // `len` is always an acceptable target.
        let _ = map.trim_to(len);
    }

    /// Shrink the key index to `capacity`, which must not be below `len()`.
    pub fn trim_excess(&self, capacity: usize) -> Result<()> {
        self.shared.borrow_mut().trim_to(capacity)
    }

    /// Reserve room for `additional` more values in every attached collection.
    pub fn reserve_values(&self, additional: usize) {
        self.shared
            .borrow()
            .for_each_values(|c| c.reserve(additional))
    }

    /// Shrink every attached collection to fit its contents.
    pub fn shrink_values(&self) {
        self.shared.borrow().for_each_values(|c| c.shrink_to_fit())
    }
}

impl<K, V, S> MultiMap<K, Vec<V>, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    /// Insert `value` at `index` in the list for `key`. On an absent key only
    /// index 0 is accepted.
    pub fn insert_at(&self, key: K, index: usize, value: V) -> Result<()> {
        let mut map = self.shared.borrow_mut();
        let slot = map.slot_for(key);
        if !slot.is_attached() && index != 0 {
            return Err(Error::KeyNotFound);
        }
        map.edit_slot(&slot, |c| {
            if index > c.len() {
                return Err(Error::IndexOutOfRange {
                    index,
                    len: c.len(),
                });
            }
            c.insert(index, value);
            Ok(())
        })
    }

    /// Remove and return the value at `index` in the list for `key`.
    pub fn remove_at<Q>(&self, key: &Q, index: usize) -> Result<V>
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let mut map = self.shared.borrow_mut();
        let slot = map.find(key).map(Rc::clone).ok_or(Error::KeyNotFound)?;
        map.edit_slot(&slot, |c| {
            check_index(index, c.len())?;
            Ok(c.remove(index))
        })
    }
}

impl<K, C, S> FromIterator<(K, C::Item)> for MultiMap<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, C::Item)>>(iter: I) -> Self {
        let map = Self::default();
        for (k, v) in iter {
            map.add(k, v);
        }
        map
    }
}

impl<K, C, S> Extend<(K, C::Item)> for MultiMap<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, C::Item)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.add(k, v);
        }
    }
}

impl<K, C, S> fmt::Debug for MultiMap<K, C, S>
where
    K: Eq + Hash + fmt::Debug,
    C: ValueCollection + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.shared.borrow();
        let mut out = f.debug_map();
        for slot in map.slots() {
            out.entry(slot.key(), &*slot.values());
        }
        out.finish()
    }
}
