//! Read-only façades.
//!
//! `ReadOnly<T>` wraps a dictionary, a per-key view or an aggregate view and
//! exposes only the non-mutating operations of the wrapped value, live: it
//! copies nothing and always reflects the current state. The wrapper has no
//! mutating methods at all, so mutation through it does not compile:
//!
//! ```compile_fail
//! use rc_multimap::ListMultiMap;
//! let d: ListMultiMap<u32, u32> = ListMultiMap::new();
//! d.read_only().add(1, 2);
//! ```
//!
//! The read contracts are traits so generic code can accept the mutable
//! types and their wrappers alike:
//!
//! - `ReadValues` / `ReadList`: one key's collection;
//! - `CollectionLookup<K>` / `ReadMultiMap<K>`: the dictionary;
//! - `ReadAggregate`: keys, collections and values views.
//!
//! Anything handed out through a wrapper is itself wrapped, and wrapping a
//! wrapper exposes the same contract.

use crate::aggregate::{CollectionsView, KeysView, ValuesView};
use crate::collection::ValueCollection;
use crate::error::Result;
use crate::iter::{CollectionsIter, KeysIter, ValuesIter, ViewIter};
use crate::map::MultiMap;
use crate::view::ValueView;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::Map;
use std::rc::Rc;

/// Non-mutating façade over `T`.
#[derive(Clone, Copy)]
pub struct ReadOnly<T> {
    inner: T,
}

impl<T> ReadOnly<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Another handle on the same façade. Read-only is already as narrow as
    /// it gets, so no further wrapping happens.
    pub fn read_only(&self) -> Self
    where
        T: Clone,
    {
        self.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnly<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnly").field(&self.inner).finish()
    }
}

impl<T, U> PartialEq<ReadOnly<U>> for ReadOnly<T>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &ReadOnly<U>) -> bool {
        self.inner == other.inner
    }
}

impl<T: Eq> Eq for ReadOnly<T> {}

impl<K, C, S> PartialEq<ValueView<K, C, S>> for ReadOnly<ValueView<K, C, S>>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    fn eq(&self, other: &ValueView<K, C, S>) -> bool {
        self.inner == *other
    }
}

// ---- per-key collections ----

/// Read contract of one key's collection.
pub trait ReadValues {
    type Key;
    type Item;
    type Iter: Iterator<Item = Result<Self::Item>>;

    fn key(&self) -> &Self::Key;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, value: &Self::Item) -> bool;

    /// Snapshot of the current contents.
    fn to_vec(&self) -> Vec<Self::Item>;

    /// Fail-fast iterator over the current contents.
    fn iter(&self) -> Self::Iter;
}

/// Adds positional reads to `ReadValues`.
pub trait ReadList: ReadValues {
    fn get(&self, index: usize) -> Result<Self::Item>;

    fn first(&self) -> Option<Self::Item>;

    fn last(&self) -> Option<Self::Item>;

    fn index_of(&self, value: &Self::Item) -> Option<usize>;

    fn last_index_of(&self, value: &Self::Item) -> Option<usize>;
}

impl<K, C, S> ReadValues for ValueView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    C::Item: Clone,
    S: BuildHasher,
{
    type Key = K;
    type Item = C::Item;
    type Iter = ViewIter<K, C>;

    fn key(&self) -> &K {
        ValueView::key(self)
    }

    fn len(&self) -> usize {
        ValueView::len(self)
    }

    fn contains(&self, value: &C::Item) -> bool {
        ValueView::contains(self, value)
    }

    fn to_vec(&self) -> Vec<C::Item> {
        ValueView::to_vec(self)
    }

    fn iter(&self) -> ViewIter<K, C> {
        ValueView::iter(self)
    }
}

impl<K, V, S> ReadList for ValueView<K, Vec<V>, S>
where
    K: Eq + Hash,
    V: PartialEq + Clone,
    S: BuildHasher,
{
    fn get(&self, index: usize) -> Result<V> {
        ValueView::get(self, index)
    }

    fn first(&self) -> Option<V> {
        ValueView::first(self)
    }

    fn last(&self) -> Option<V> {
        ValueView::last(self)
    }

    fn index_of(&self, value: &V) -> Option<usize> {
        ValueView::index_of(self, value)
    }

    fn last_index_of(&self, value: &V) -> Option<usize> {
        ValueView::last_index_of(self, value)
    }
}

impl<T: ReadValues> ReadValues for ReadOnly<T> {
    type Key = T::Key;
    type Item = T::Item;
    type Iter = T::Iter;

    fn key(&self) -> &T::Key {
        self.inner.key()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn contains(&self, value: &T::Item) -> bool {
        self.inner.contains(value)
    }

    fn to_vec(&self) -> Vec<T::Item> {
        self.inner.to_vec()
    }

    fn iter(&self) -> T::Iter {
        self.inner.iter()
    }
}

impl<T: ReadList> ReadList for ReadOnly<T> {
    fn get(&self, index: usize) -> Result<T::Item> {
        self.inner.get(index)
    }

    fn first(&self) -> Option<T::Item> {
        self.inner.first()
    }

    fn last(&self) -> Option<T::Item> {
        self.inner.last()
    }

    fn index_of(&self, value: &T::Item) -> Option<usize> {
        self.inner.index_of(value)
    }

    fn last_index_of(&self, value: &T::Item) -> Option<usize> {
        self.inner.last_index_of(value)
    }
}

// ---- dictionaries ----

/// The dictionary seen as a lookup from key to collection.
pub trait CollectionLookup<K> {
    type Collection: ReadValues<Key = K>;
    type KeyIter: Iterator<Item = Result<K>>;

    /// Number of keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq;

    /// The collection for `key` if the key is present.
    fn get<Q>(&self, key: &Q) -> Option<Self::Collection>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq;

    /// Fail-fast iterator over the keys.
    fn key_iter(&self) -> Self::KeyIter;
}

/// Full read contract of a multi-value dictionary.
pub trait ReadMultiMap<K>: CollectionLookup<K> {
    /// Total number of values across all keys.
    fn value_count(&self) -> usize;

    fn value_count_of<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq;

    fn contains<Q>(&self, key: &Q, value: &<Self::Collection as ReadValues>::Item) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq;

    fn contains_value(&self, value: &<Self::Collection as ReadValues>::Item) -> bool;

    /// The collection for `key`, empty when the key is absent.
    fn view(&self, key: K) -> Self::Collection;

    fn try_get_values<Q>(&self, key: &Q) -> Option<Self::Collection>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key)
    }
}

impl<K, C, S> CollectionLookup<K> for MultiMap<K, C, S>
where
    K: Eq + Hash + Clone,
    C: ValueCollection,
    C::Item: Clone,
    S: BuildHasher,
{
    type Collection = ValueView<K, C, S>;
    type KeyIter = KeysIter<K, C, S>;

    fn len(&self) -> usize {
        MultiMap::len(self)
    }

    fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        MultiMap::contains_key(self, key)
    }

    fn get<Q>(&self, key: &Q) -> Option<ValueView<K, C, S>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        MultiMap::try_get_values(self, key)
    }

    fn key_iter(&self) -> KeysIter<K, C, S> {
        KeysIter::new(Rc::clone(self.shared()))
    }
}

impl<K, C, S> ReadMultiMap<K> for MultiMap<K, C, S>
where
    K: Eq + Hash + Clone,
    C: ValueCollection,
    C::Item: Clone,
    S: BuildHasher,
{
    fn value_count(&self) -> usize {
        MultiMap::value_count(self)
    }

    fn value_count_of<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        MultiMap::value_count_of(self, key)
    }

    fn contains<Q>(&self, key: &Q, value: &C::Item) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        MultiMap::contains(self, key, value)
    }

    fn contains_value(&self, value: &C::Item) -> bool {
        MultiMap::contains_value(self, value)
    }

    fn view(&self, key: K) -> ValueView<K, C, S> {
        MultiMap::view(self, key)
    }
}

impl<K, T> CollectionLookup<K> for &T
where
    T: ?Sized + CollectionLookup<K>,
{
    type Collection = T::Collection;
    type KeyIter = T::KeyIter;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        (**self).contains_key(key)
    }

    fn get<Q>(&self, key: &Q) -> Option<T::Collection>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        (**self).get(key)
    }

    fn key_iter(&self) -> T::KeyIter {
        (**self).key_iter()
    }
}

impl<K, T> ReadMultiMap<K> for &T
where
    T: ?Sized + ReadMultiMap<K>,
{
    fn value_count(&self) -> usize {
        (**self).value_count()
    }

    fn value_count_of<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        (**self).value_count_of(key)
    }

    fn contains<Q>(&self, key: &Q, value: &<T::Collection as ReadValues>::Item) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        (**self).contains(key, value)
    }

    fn contains_value(&self, value: &<T::Collection as ReadValues>::Item) -> bool {
        (**self).contains_value(value)
    }

    fn view(&self, key: K) -> T::Collection {
        (**self).view(key)
    }
}

impl<K, T> CollectionLookup<K> for ReadOnly<T>
where
    T: CollectionLookup<K>,
{
    type Collection = ReadOnly<T::Collection>;
    type KeyIter = T::KeyIter;

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.contains_key(key)
    }

    fn get<Q>(&self, key: &Q) -> Option<ReadOnly<T::Collection>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.get(key).map(ReadOnly::new)
    }

    fn key_iter(&self) -> T::KeyIter {
        self.inner.key_iter()
    }
}

impl<K, T> ReadMultiMap<K> for ReadOnly<T>
where
    T: ReadMultiMap<K>,
{
    fn value_count(&self) -> usize {
        self.inner.value_count()
    }

    fn value_count_of<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.value_count_of(key)
    }

    fn contains<Q>(&self, key: &Q, value: &<T::Collection as ReadValues>::Item) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.contains(key, value)
    }

    fn contains_value(&self, value: &<T::Collection as ReadValues>::Item) -> bool {
        self.inner.contains_value(value)
    }

    fn view(&self, key: K) -> ReadOnly<T::Collection> {
        ReadOnly::new(self.inner.view(key))
    }
}

/// Read-only aggregate views of the wrapped dictionary.
impl<'a, K, C, S> ReadOnly<&'a MultiMap<K, C, S>>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub fn keys(&self) -> ReadOnly<KeysView<K, C, S>> {
        self.inner.keys().read_only()
    }

    pub fn collections(&self) -> ReadOnly<CollectionsView<K, C, S>> {
        self.inner.collections().read_only()
    }

    pub fn values(&self) -> ReadOnly<ValuesView<K, C, S>> {
        self.inner.values().read_only()
    }
}

// ---- aggregates ----

/// Read contract shared by the keys, collections and values views.
pub trait ReadAggregate {
    type Item;
    type Iter: Iterator<Item = Result<Self::Item>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, item: &Self::Item) -> bool;

    fn iter(&self) -> Self::Iter;
}

impl<K, C, S> ReadAggregate for KeysView<K, C, S>
where
    K: Eq + Hash + Clone,
    C: ValueCollection,
    S: BuildHasher,
{
    type Item = K;
    type Iter = KeysIter<K, C, S>;

    fn len(&self) -> usize {
        KeysView::len(self)
    }

    fn contains(&self, key: &K) -> bool {
        KeysView::contains(self, key)
    }

    fn iter(&self) -> KeysIter<K, C, S> {
        KeysView::iter(self)
    }
}

impl<K, C, S> ReadAggregate for ValuesView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    C::Item: Clone,
    S: BuildHasher,
{
    type Item = C::Item;
    type Iter = ValuesIter<K, C, S>;

    fn len(&self) -> usize {
        ValuesView::len(self)
    }

    fn contains(&self, value: &C::Item) -> bool {
        ValuesView::contains(self, value)
    }

    fn iter(&self) -> ValuesIter<K, C, S> {
        ValuesView::iter(self)
    }
}

impl<K, C, S> ReadAggregate for CollectionsView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    type Item = ValueView<K, C, S>;
    type Iter = CollectionsIter<K, C, S>;

    fn len(&self) -> usize {
        CollectionsView::len(self)
    }

    fn contains(&self, view: &ValueView<K, C, S>) -> bool {
        CollectionsView::contains(self, view)
    }

    fn iter(&self) -> CollectionsIter<K, C, S> {
        CollectionsView::iter(self)
    }
}

impl<K, C, S> ReadAggregate for ReadOnly<KeysView<K, C, S>>
where
    KeysView<K, C, S>: ReadAggregate,
{
    type Item = <KeysView<K, C, S> as ReadAggregate>::Item;
    type Iter = <KeysView<K, C, S> as ReadAggregate>::Iter;

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn contains(&self, key: &Self::Item) -> bool {
        self.inner.contains(key)
    }

    fn iter(&self) -> Self::Iter {
        self.inner.iter()
    }
}

impl<K, C, S> ReadAggregate for ReadOnly<ValuesView<K, C, S>>
where
    ValuesView<K, C, S>: ReadAggregate,
{
    type Item = <ValuesView<K, C, S> as ReadAggregate>::Item;
    type Iter = <ValuesView<K, C, S> as ReadAggregate>::Iter;

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn contains(&self, value: &Self::Item) -> bool {
        self.inner.contains(value)
    }

    fn iter(&self) -> Self::Iter {
        self.inner.iter()
    }
}

type ViewResult<K, C, S> = Result<ValueView<K, C, S>>;
type ReadOnlyViewResult<K, C, S> = Result<ReadOnly<ValueView<K, C, S>>>;

/// Collections handed out through a read-only façade are read-only too.
impl<K, C, S> ReadAggregate for ReadOnly<CollectionsView<K, C, S>>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    type Item = ReadOnly<ValueView<K, C, S>>;
    type Iter = Map<CollectionsIter<K, C, S>, fn(ViewResult<K, C, S>) -> ReadOnlyViewResult<K, C, S>>;

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn contains(&self, view: &ReadOnly<ValueView<K, C, S>>) -> bool {
        self.inner.contains(&view.inner)
    }

    fn iter(&self) -> Self::Iter {
        let guard: fn(ViewResult<K, C, S>) -> ReadOnlyViewResult<K, C, S> =
            |item| item.map(ReadOnly::new);
        self.inner.iter().map(guard)
    }
}

impl<T> ReadAggregate for ReadOnly<ReadOnly<T>>
where
    ReadOnly<T>: ReadAggregate,
{
    type Item = <ReadOnly<T> as ReadAggregate>::Item;
    type Iter = <ReadOnly<T> as ReadAggregate>::Iter;

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn contains(&self, item: &Self::Item) -> bool {
        self.inner.contains(item)
    }

    fn iter(&self) -> Self::Iter {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ListMultiMap;

    fn sample() -> ListMultiMap<&'static str, u32> {
        let d = ListMultiMap::new();
        d.add_range("a", [3, 1, 2]);
        d.add_range("b", [4]);
        d
    }

    /// Generic read-only consumer: compiles against the mutable map and its
    /// wrapper alike.
    fn total<M: ReadMultiMap<&'static str>>(m: &M) -> usize {
        m.key_iter()
            .map(|k| k.map(|k| m.value_count_of(&k)))
            .sum::<Result<usize>>()
            .unwrap()
    }

    /// Invariant: reading a key through the wrapper yields the same
    /// collection as reading it directly.
    #[test]
    fn lookup_through_wrapper_is_same_collection() {
        let d = sample();
        let ro = d.read_only();
        let got = ro.get(&"a").expect("present");
        assert!(got == d.view("a"));
        assert_eq!(got.to_vec(), d.view("a").to_vec());
        assert!(ro.get(&"zz").is_none());
        assert_eq!(ro.view("zz").len(), 0);
    }

    /// Invariant: the wrapper is live, never a snapshot.
    #[test]
    fn wrapper_reads_through() {
        let d = sample();
        let ro = d.read_only();
        let a = ro.view("a");
        assert_eq!((ro.len(), ro.value_count()), (2, 4));
        d.add("c", 9);
        d.view("a").push(5);
        assert_eq!((ro.len(), ro.value_count()), (3, 6));
        assert_eq!(a.last(), Some(5));
        assert!(ro.contains(&"c", &9));
        assert!(ro.contains_value(&4));
        assert_eq!(total(&d), total(&ro));
    }

    /// Invariant: wrapping a wrapper exposes the same contract.
    #[test]
    fn nested_wrappers_compose() {
        let d = sample();
        let ro = d.read_only();
        let twice = ReadOnly::new(ro);
        assert_eq!(twice.value_count(), d.value_count());
        let a = twice.get(&"a").expect("present");
        assert_eq!(a.get(1), Ok(1));
        assert_eq!(a.index_of(&2), Some(2));
        assert_eq!(total(&twice), 4);

        let keys = ReadOnly::new(ro.keys());
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"b"));
        assert_eq!(ro.keys().read_only().len(), keys.len());
    }

    #[test]
    fn aggregates_hand_out_read_only_collections() {
        let d = sample();
        let ro = d.read_only();
        let views: Vec<ReadOnly<ValueView<_, _, _>>> =
            ro.collections().iter().collect::<Result<_>>().unwrap();
        assert_eq!(views.len(), 2);
        assert!(ro.collections().contains(&views[0]));
        let values: Vec<u32> = ro.values().iter().collect::<Result<_>>().unwrap();
        assert_eq!(values.len(), ReadAggregate::len(&ro.values()));
        assert!(ro.values().contains(&4));
    }

    #[test]
    fn read_only_view_iterator_fails_fast() {
        let d = sample();
        let a = d.view("a").read_only();
        let mut it = ReadValues::iter(&a);
        assert_eq!(it.next(), Some(Ok(3)));
        d.view("a").sort();
        assert_eq!(it.next(), Some(Err(crate::Error::ConcurrentModification)));
        assert_eq!(ReadValues::to_vec(&a), [1, 2, 3]);
    }
}
