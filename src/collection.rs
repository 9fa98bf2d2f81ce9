//! Per-key storage: the `ValueCollection` trait and its two implementations.
//!
//! - `Vec<V>`: ordered sequence, duplicates allowed.
//! - `UniqueSet<V, S>`: hash set with insertion-ordered dense storage. The
//!   dense layout lets enumerators address elements by position without
//!   holding a borrow between steps.

use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use std::collections::hash_map::RandomState;

/// Storage behind a per-key view.
///
/// `value_at` must enumerate every element exactly once for positions
/// `0..len()` and stay stable until the next mutation.
pub trait ValueCollection: Default {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add one element. Returns false when the collection rejected it
    /// (duplicate in a set).
    fn insert_value(&mut self, value: Self::Item) -> bool;

    /// Remove one occurrence of `value`.
    fn remove_value(&mut self, value: &Self::Item) -> bool;

    fn contains_value(&self, value: &Self::Item) -> bool;

    fn clear_values(&mut self);

    /// Element at enumeration position `position`.
    fn value_at(&self, position: usize) -> Option<&Self::Item>;

    fn capacity(&self) -> usize;

    fn reserve(&mut self, additional: usize);

    fn shrink_to_fit(&mut self);
}

impl<V: PartialEq> ValueCollection for Vec<V> {
    type Item = V;

    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn insert_value(&mut self, value: V) -> bool {
        self.push(value);
        true
    }

    fn remove_value(&mut self, value: &V) -> bool {
        match self.iter().position(|v| v == value) {
            Some(i) => {
                Vec::remove(self, i);
                true
            }
            None => false,
        }
    }

    #[inline]
    fn contains_value(&self, value: &V) -> bool {
        self.as_slice().contains(value)
    }

    #[inline]
    fn clear_values(&mut self) {
        Vec::clear(self)
    }

    #[inline]
    fn value_at(&self, position: usize) -> Option<&V> {
        self.get(position)
    }

    #[inline]
    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }

    #[inline]
    fn reserve(&mut self, additional: usize) {
        Vec::reserve(self, additional)
    }

    #[inline]
    fn shrink_to_fit(&mut self) {
        Vec::shrink_to_fit(self)
    }
}

#[derive(Clone)]
struct Bucket<V> {
    hash: u64,
    value: V,
}

/// Hash set whose elements live in a dense vector in insertion order; the
/// `HashTable` indexes positions into that vector. Removal swaps the last
/// element into the hole, so order is stable only between mutations.
#[derive(Clone)]
pub struct UniqueSet<V, S = RandomState> {
    hasher: S,
    index: HashTable<usize>,
    slots: Vec<Bucket<V>>,
}

impl<V> UniqueSet<V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<V, S: Default> Default for UniqueSet<V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<V, S> UniqueSet<V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Elements in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.slots.iter().map(|s| &s.value)
    }

    #[inline]
    pub fn get_index(&self, position: usize) -> Option<&V> {
        self.slots.get(position).map(|s| &s.value)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        let slots = &self.slots;
        for (i, s) in slots.iter().enumerate() {
            self.index.insert_unique(s.hash, i, |&j| slots[j].hash);
        }
    }
}

/// Rebuilds the index when dropped if the dense slots changed length, so a
/// panicking `retain` predicate cannot leave stale positions behind.
struct ReindexOnDrop<'a, V, S> {
    set: &'a mut UniqueSet<V, S>,
    len: usize,
}

impl<V, S> Drop for ReindexOnDrop<'_, V, S> {
    fn drop(&mut self) {
        if self.set.slots.len() != self.len {
            self.set.rebuild_index();
        }
    }
}

impl<V, S> UniqueSet<V, S>
where
    V: Eq + Hash,
    S: BuildHasher,
{
    fn find_position(&self, hash: u64, value: &V) -> Option<usize> {
        let slots = &self.slots;
        self.index.find(hash, |&i| slots[i].value == *value).copied()
    }

    pub fn contains(&self, value: &V) -> bool {
        let hash = self.hasher.hash_one(value);
        self.find_position(hash, value).is_some()
    }

    /// Insert `value`; returns false and drops it when already present.
    pub fn insert(&mut self, value: V) -> bool {
        let hash = self.hasher.hash_one(&value);
        let slots = &self.slots;
        match self.index.entry(
            hash,
            |&i| slots[i].value == value,
            |&i| slots[i].hash,
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => false,
            hashbrown::hash_table::Entry::Vacant(v) => {
                v.insert(self.slots.len());
                self.slots.push(Bucket { hash, value });
                true
            }
        }
    }

    /// Remove `value`, returning it when it was present.
    pub fn take(&mut self, value: &V) -> Option<V> {
        let hash = self.hasher.hash_one(value);
        let slots = &self.slots;
        let (position, _) = self
            .index
            .find_entry(hash, |&i| slots[i].value == *value)
            .ok()?
            .remove();
        Some(self.swap_remove_slot(position))
    }

    pub fn remove(&mut self, value: &V) -> bool {
        self.take(value).is_some()
    }

    /// Remove the slot at `position` (already unlinked from the index) and
    /// patch the index entry of the element moved into its place.
    fn swap_remove_slot(&mut self, position: usize) -> V {
        let last = self.slots.len() - 1;
        if position != last {
            let moved_hash = self.slots[last].hash;
            if let Some(i) = self.index.find_mut(moved_hash, |&i| i == last) {
                *i = position;
            }
        }
        self.slots.swap_remove(position).value
    }

    /// Keep only the elements for which `keep` returns true. Returns the
    /// number removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&V) -> bool,
    {
        let before = self.slots.len();
        let mut guard = ReindexOnDrop {
            set: self,
            len: before,
        };
        guard.set.slots.retain(|s| keep(&s.value));
        before - guard.set.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity().min(self.index.capacity())
    }

    pub fn reserve(&mut self, additional: usize) {
        let slots = &self.slots;
        self.index.reserve(additional, |&i| slots[i].hash);
        self.slots.reserve(additional);
    }

    pub fn shrink_to_fit(&mut self) {
        let slots = &self.slots;
        self.index.shrink_to_fit(|&i| slots[i].hash);
        self.slots.shrink_to_fit();
    }
}

impl<V, S> ValueCollection for UniqueSet<V, S>
where
    V: Eq + Hash,
    S: BuildHasher + Default,
{
    type Item = V;

    #[inline]
    fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn insert_value(&mut self, value: V) -> bool {
        self.insert(value)
    }

    #[inline]
    fn remove_value(&mut self, value: &V) -> bool {
        self.remove(value)
    }

    #[inline]
    fn contains_value(&self, value: &V) -> bool {
        self.contains(value)
    }

    #[inline]
    fn clear_values(&mut self) {
        self.clear()
    }

    #[inline]
    fn value_at(&self, position: usize) -> Option<&V> {
        self.get_index(position)
    }

    #[inline]
    fn capacity(&self) -> usize {
        UniqueSet::capacity(self)
    }

    #[inline]
    fn reserve(&mut self, additional: usize) {
        UniqueSet::reserve(self, additional)
    }

    #[inline]
    fn shrink_to_fit(&mut self) {
        UniqueSet::shrink_to_fit(self)
    }
}

impl<V: fmt::Debug, S> fmt::Debug for UniqueSet<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slots.iter().map(|s| &s.value)).finish()
    }
}

impl<V, S> PartialEq for UniqueSet<V, S>
where
    V: Eq + Hash,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl<V: Eq + Hash, S: BuildHasher> Eq for UniqueSet<V, S> {}

impl<V, S> FromIterator<V> for UniqueSet<V, S>
where
    V: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut set = Self::default();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

/// Owning iterator over a `UniqueSet`, in enumeration order.
pub struct IntoIter<V> {
    inner: std::vec::IntoIter<Bucket<V>>,
}

impl<V> Iterator for IntoIter<V> {
    type Item = V;

    #[inline]
    fn next(&mut self) -> Option<V> {
        self.inner.next().map(|b| b.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for IntoIter<V> {}

impl<V, S> IntoIterator for UniqueSet<V, S> {
    type Item = V;
    type IntoIter = IntoIter<V>;

    fn into_iter(self) -> IntoIter<V> {
        IntoIter {
            inner: self.slots.into_iter(),
        }
    }
}

impl<V, S> Extend<V> for UniqueSet<V, S>
where
    V: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for v in iter {
            self.insert(v);
        }
    }
}
