//! Read-through aggregate views: keys, per-key collections, flattened values.
//!
//! Each view holds only a back-reference to the backing map. Sizes are read
//! from the map on every call and nothing is cached.

use crate::collection::ValueCollection;
use crate::iter::{CollectionsIter, KeysIter, ValuesIter};
use crate::map::Shared;
use crate::read_only::ReadOnly;
use crate::view::ValueView;
use core::hash::{BuildHasher, Hash};
use std::rc::Rc;

/// Every attached key.
pub struct KeysView<K, C, S> {
    shared: Shared<K, C, S>,
}

impl<K, C, S> Clone for KeysView<K, C, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<K, C, S> KeysView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub(crate) fn new(shared: Shared<K, C, S>) -> Self {
        Self { shared }
    }

    pub fn len(&self) -> usize {
        self.shared.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.borrow().is_empty()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: core::borrow::Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shared.borrow().contains_key(key)
    }

    pub fn iter(&self) -> KeysIter<K, C, S> {
        KeysIter::new(Rc::clone(&self.shared))
    }

    pub fn read_only(&self) -> ReadOnly<Self> {
        ReadOnly::new(self.clone())
    }
}

impl<K, C, S> IntoIterator for &KeysView<K, C, S>
where
    K: Eq + Hash + Clone,
    C: ValueCollection,
    S: BuildHasher,
{
    type Item = crate::Result<K>;
    type IntoIter = KeysIter<K, C, S>;

    fn into_iter(self) -> KeysIter<K, C, S> {
        self.iter()
    }
}

/// Every attached per-key collection, as live views.
pub struct CollectionsView<K, C, S> {
    shared: Shared<K, C, S>,
}

impl<K, C, S> Clone for CollectionsView<K, C, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<K, C, S> CollectionsView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub(crate) fn new(shared: Shared<K, C, S>) -> Self {
        Self { shared }
    }

    pub fn len(&self) -> usize {
        self.shared.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.borrow().is_empty()
    }

    /// Whether `view` is one of this map's attached collections.
    pub fn contains(&self, view: &ValueView<K, C, S>) -> bool {
        view.shares_owner(&self.shared) && view.is_attached()
    }

    pub fn iter(&self) -> CollectionsIter<K, C, S> {
        CollectionsIter::new(Rc::clone(&self.shared))
    }

    pub fn read_only(&self) -> ReadOnly<Self> {
        ReadOnly::new(self.clone())
    }
}

impl<K, C, S> IntoIterator for &CollectionsView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    type Item = crate::Result<ValueView<K, C, S>>;
    type IntoIter = CollectionsIter<K, C, S>;

    fn into_iter(self) -> CollectionsIter<K, C, S> {
        self.iter()
    }
}

/// Every value of every key, flattened.
pub struct ValuesView<K, C, S> {
    shared: Shared<K, C, S>,
}

impl<K, C, S> Clone for ValuesView<K, C, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<K, C, S> ValuesView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub(crate) fn new(shared: Shared<K, C, S>) -> Self {
        Self { shared }
    }

    /// Total number of values.
    pub fn len(&self) -> usize {
        self.shared.borrow().value_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: &C::Item) -> bool {
        self.shared
            .borrow()
            .slots()
            .any(|slot| slot.values().contains_value(value))
    }

    pub fn iter(&self) -> ValuesIter<K, C, S> {
        ValuesIter::new(Rc::clone(&self.shared))
    }

    pub fn read_only(&self) -> ReadOnly<Self> {
        ReadOnly::new(self.clone())
    }
}

impl<K, C, S> IntoIterator for &ValuesView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    C::Item: Clone,
    S: BuildHasher,
{
    type Item = crate::Result<C::Item>;
    type IntoIter = ValuesIter<K, C, S>;

    fn into_iter(self) -> ValuesIter<K, C, S> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, ListMultiMap};
    use std::collections::BTreeSet;

    fn sample() -> ListMultiMap<&'static str, u32> {
        let d = ListMultiMap::new();
        d.add_range("a", [1, 2]);
        d.add_range("b", [3]);
        d.add_range("c", [4, 5, 6]);
        d
    }

    /// Invariant: sizes are recomputed from the map on every call.
    #[test]
    fn sizes_read_through() {
        let d = sample();
        let keys = d.keys();
        let values = d.values();
        assert_eq!((keys.len(), values.len()), (3, 6));
        d.add("d", 7);
        assert_eq!((keys.len(), values.len()), (4, 7));
        d.remove(&"c");
        assert_eq!((keys.len(), values.len()), (3, 4));
        assert_eq!(d.collections().len(), 3);
    }

    /// Invariant: values are flattened key by key, keeping per-key order.
    #[test]
    fn values_flatten_in_key_then_insertion_order() {
        let d = sample();
        let keys: Vec<&str> = d.keys().iter().collect::<Result<_, _>>().unwrap();
        let values: Vec<u32> = d.values().iter().collect::<Result<_, _>>().unwrap();
        let expected: Vec<u32> = keys.iter().flat_map(|&k| d.view(k).to_vec()).collect();
        assert_eq!(values, expected);
        let set: BTreeSet<u32> = values.into_iter().collect();
        assert_eq!(set, (1..=6).collect());
    }

    /// Invariant: an enumerator fails on its first step after a structural
    /// mutation, then stays exhausted.
    #[test]
    fn keys_iter_fails_fast() {
        let d = sample();
        let mut it = d.keys().iter();
        assert!(matches!(it.next(), Some(Ok(_))));
        d.add("z", 9);
        assert_eq!(it.next(), Some(Err(Error::ConcurrentModification)));
        assert_eq!(it.next(), None);
    }

    /// Invariant: editing an attached view through any path invalidates
    /// dictionary-level enumerators.
    #[test]
    fn values_iter_fails_after_view_edit() {
        let d = sample();
        let mut it = d.values().iter();
        assert!(matches!(it.next(), Some(Ok(_))));
        d.view("b").push(10);
        assert_eq!(it.next(), Some(Err(Error::ConcurrentModification)));
    }

    /// Invariant: a failed probe (absent value, absent key) is not structural.
    #[test]
    fn noop_edits_keep_enumerators_valid() {
        let d = sample();
        let mut it = d.collections().iter();
        assert!(matches!(it.next(), Some(Ok(_))));
        assert!(!d.remove_value(&"a", &99));
        assert!(!d.remove(&"missing"));
        assert!(d.view("missing").is_empty());
        assert!(matches!(it.next(), Some(Ok(_))));
    }

    #[test]
    fn collections_contains_checks_owner_and_attachment() {
        let d = sample();
        let other = sample();
        assert!(d.collections().contains(&d.view("a")));
        assert!(!d.collections().contains(&other.view("a")));
        assert!(!d.collections().contains(&d.view("nope")));
        let views: Vec<_> = d.collections().iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(views.len(), 3);
        assert!(views.iter().all(|v| !v.is_empty()));
    }
}
