//! ValueView: the live per-key collection handed out by a `MultiMap`.
//!
//! A view is a cheap handle: the owning map plus the slot created for its
//! key. All reads and writes go through the map's current state:
//!
//! - attached slot: reads and writes hit the map's storage directly;
//! - detached, empty slot: resolves to whatever is attached under the key
//!   right now, and attaches itself on the first insertion if nothing is;
//! - detached, non-empty slot (key removed while the view held values): the
//!   view keeps editing its private contents and the map does not see them
//!   until the view is emptied again.

use crate::collection::{UniqueSet, ValueCollection};
use crate::error::{check_index, check_range, Error, Result};
use crate::iter::ViewIter;
use crate::map::Shared;
use crate::read_only::ReadOnly;
use crate::slot::Slot;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::rc::Rc;

pub struct ValueView<K, C, S = RandomState> {
    shared: Shared<K, C, S>,
    slot: Rc<Slot<K, C>>,
}

impl<K, C, S> Clone for ValueView<K, C, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<K, C, S> ValueView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub(crate) fn new(shared: Shared<K, C, S>, slot: Rc<Slot<K, C>>) -> Self {
        Self { shared, slot }
    }

    /// The slot this view acts on right now.
    fn current(&self) -> Rc<Slot<K, C>> {
        self.shared.borrow().resolve(&self.slot)
    }

    /// Borrowed read of the current contents.
    ///
    /// The contents stay borrowed while `f` runs: mutating this view (or any
    /// handle on the same key) from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        let slot = self.current();
        let values = slot.values();
        f(&*values)
    }

    /// Element-wise edit; the map is held for the whole edit so user code run
    /// by `op` cannot observe a half-applied change.
    pub(crate) fn edit<R>(&self, op: impl FnOnce(&mut C) -> R) -> R {
        let mut map = self.shared.borrow_mut();
        let slot = map.resolve(&self.slot);
        map.edit_slot(&slot, op)
    }

    /// Edit that may overwrite or reorder elements without changing the count.
    pub(crate) fn rewrite<R>(&self, op: impl FnOnce(&mut C) -> Result<R>) -> Result<R> {
        let mut map = self.shared.borrow_mut();
        let slot = map.resolve(&self.slot);
        map.rewrite_slot(&slot, op)
    }

    /// Positional edit. On a detached empty view this is an edit of an
    /// absent key, which `absent` decides.
    fn edit_at<R>(
        &self,
        absent: impl FnOnce() -> Result<()>,
        op: impl FnOnce(&mut C) -> Result<R>,
    ) -> Result<R> {
        let mut map = self.shared.borrow_mut();
        let slot = map.resolve(&self.slot);
        if !slot.is_attached() && slot.len() == 0 {
            absent()?;
        }
        map.edit_slot(&slot, op)
    }

    #[inline]
    pub fn key(&self) -> &K {
        self.slot.key()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the view currently acts on storage attached to the map.
    pub fn is_attached(&self) -> bool {
        self.current().is_attached()
    }

    pub fn contains(&self, value: &C::Item) -> bool {
        self.with(|c| c.contains_value(value))
    }

    /// Insert one value: appended for lists, added if absent for sets.
    /// Returns false when a set already held it.
    pub fn add(&self, value: C::Item) -> bool {
        self.edit(|c| c.insert_value(value))
    }

    /// Remove one occurrence of `value`.
    pub fn remove(&self, value: &C::Item) -> bool {
        self.edit(|c| c.remove_value(value))
    }

    /// Remove every value; detaches the key.
    pub fn clear(&self) -> bool {
        self.edit(|c| {
            let had = !c.is_empty();
            c.clear_values();
            had
        })
    }

    pub fn capacity(&self) -> usize {
        self.with(|c| c.capacity())
    }

    pub fn reserve(&self, additional: usize) {
        let slot = self.current();
        let _ = slot.edit(|c| c.reserve(additional));
    }

    pub fn shrink_to_fit(&self) {
        let slot = self.current();
        let _ = slot.edit(|c| c.shrink_to_fit());
    }

    /// Fail-fast iterator over the current contents.
    pub fn iter(&self) -> ViewIter<K, C> {
        ViewIter::new(self.current())
    }

    pub fn to_vec(&self) -> Vec<C::Item>
    where
        C::Item: Clone,
    {
        self.with(|c| (0..c.len()).filter_map(|i| c.value_at(i)).cloned().collect())
    }

    /// A façade exposing only the non-mutating operations of this view.
    pub fn read_only(&self) -> ReadOnly<Self> {
        ReadOnly::new(self.clone())
    }

    pub(crate) fn shares_owner(&self, shared: &Shared<K, C, S>) -> bool {
        Rc::ptr_eq(&self.shared, shared)
    }
}

/// Same collection: same owning map and the same storage once resolved.
impl<K, C, S> PartialEq for ValueView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared) && Rc::ptr_eq(&self.current(), &other.current())
    }
}

impl<K, C, S> Eq for ValueView<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
}

impl<K, C, S> fmt::Debug for ValueView<K, C, S>
where
    K: Eq + Hash + fmt::Debug,
    C: ValueCollection + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|c| {
            f.debug_struct("ValueView")
                .field("key", self.key())
                .field("values", c)
                .finish()
        })
    }
}

// ---- ordered-sequence variant ----

impl<K, V, S> ValueView<K, Vec<V>, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    /// Append `value`.
    pub fn push(&self, value: V) {
        self.edit(|c| c.push(value))
    }

    /// Append every value of `values` as one logical operation.
    pub fn extend<I: IntoIterator<Item = V>>(&self, values: I) {
        // Drain the input first: it may read from this same map.
        let incoming: Vec<V> = values.into_iter().collect();
        if incoming.is_empty() {
            return;
        }
        self.edit(|c| c.extend(incoming))
    }

    /// Insert `value` at `index`. Inserting anywhere but 0 into an absent key
    /// is `KeyNotFound`.
    pub fn insert(&self, index: usize, value: V) -> Result<()> {
        self.edit_at(
            || if index == 0 { Ok(()) } else { Err(Error::KeyNotFound) },
            |c| {
                if index > c.len() {
                    return Err(Error::IndexOutOfRange {
                        index,
                        len: c.len(),
                    });
                }
                c.insert(index, value);
                Ok(())
            },
        )
    }

    /// Insert every value of `values` starting at `index`, as one operation.
    pub fn insert_range<I: IntoIterator<Item = V>>(&self, index: usize, values: I) -> Result<()> {
        let incoming: Vec<V> = values.into_iter().collect();
        self.edit_at(
            || if index == 0 { Ok(()) } else { Err(Error::KeyNotFound) },
            |c| {
                if index > c.len() {
                    return Err(Error::IndexOutOfRange {
                        index,
                        len: c.len(),
                    });
                }
                let _ = c.splice(index..index, incoming);
                Ok(())
            },
        )
    }

    pub fn get(&self, index: usize) -> Result<V>
    where
        V: Clone,
    {
        self.with(|c| {
            check_index(index, c.len())?;
            Ok(c[index].clone())
        })
    }

    pub fn first(&self) -> Option<V>
    where
        V: Clone,
    {
        self.with(|c| c.first().cloned())
    }

    pub fn last(&self) -> Option<V>
    where
        V: Clone,
    {
        self.with(|c| c.last().cloned())
    }

    /// Replace the element at `index`, returning the previous one.
    pub fn set(&self, index: usize, value: V) -> Result<V> {
        self.rewrite(|c| {
            check_index(index, c.len())?;
            Ok(core::mem::replace(&mut c[index], value))
        })
    }

    /// Remove and return the element at `index`. On an absent key this is
    /// `KeyNotFound`.
    pub fn remove_at(&self, index: usize) -> Result<V> {
        self.edit_at(
            || Err(Error::KeyNotFound),
            |c| {
                check_index(index, c.len())?;
                Ok(c.remove(index))
            },
        )
    }

    /// Remove `count` elements starting at `index`, as one operation.
    pub fn remove_range(&self, index: usize, count: usize) -> Result<()> {
        self.edit(|c| {
            check_range(index, count, c.len())?;
            c.drain(index..index + count);
            Ok(())
        })
    }

    /// Keep only the elements for which `keep` returns true. Returns the
    /// number removed.
    pub fn retain(&self, mut keep: impl FnMut(&V) -> bool) -> usize {
        self.edit(|c| {
            let before = c.len();
            c.retain(|v| keep(v));
            before - c.len()
        })
    }

    pub fn index_of(&self, value: &V) -> Option<usize> {
        self.with(|c| c.iter().position(|v| v == value))
    }

    pub fn last_index_of(&self, value: &V) -> Option<usize> {
        self.with(|c| c.iter().rposition(|v| v == value))
    }

    pub fn reverse(&self) {
        let _ = self.rewrite(|c| {
            c.reverse();
            Ok(())
        });
    }

    pub fn sort(&self)
    where
        V: Ord,
    {
        self.sort_by(V::cmp)
    }

    pub fn sort_by(&self, compare: impl FnMut(&V, &V) -> Ordering) {
        let _ = self.rewrite(|c| {
            c.sort_by(compare);
            Ok(())
        });
    }
}

// ---- unique-set variant ----

impl<K, V, S, H> ValueView<K, UniqueSet<V, H>, S>
where
    K: Eq + Hash,
    V: Eq + Hash,
    S: BuildHasher,
    H: BuildHasher + Default,
{
    /// Insert `value`; false when already present.
    pub fn insert(&self, value: V) -> bool {
        self.add(value)
    }

    /// Add every value of `values` as one logical operation (same as
    /// `union_with`).
    pub fn extend<I: IntoIterator<Item = V>>(&self, values: I) -> usize {
        self.union_with(values)
    }

    /// Keep only the values for which `keep` returns true.
    pub fn retain(&self, keep: impl FnMut(&V) -> bool) -> usize {
        self.edit(|c| c.retain(keep))
    }

    /// Add every value of `other`. Returns how many were new.
    pub fn union_with<I: IntoIterator<Item = V>>(&self, other: I) -> usize {
        let incoming: Vec<V> = other.into_iter().collect();
        if incoming.is_empty() {
            return 0;
        }
        self.edit(|c| incoming.into_iter().map(|v| c.insert(v) as usize).sum())
    }

    /// Keep only values also present in `other`. Returns how many were removed.
    pub fn intersect_with<I: IntoIterator<Item = V>>(&self, other: I) -> usize {
        let keep: UniqueSet<V, H> = other.into_iter().collect();
        self.edit(|c| c.retain(|v| keep.contains(v)))
    }

    /// Remove every value present in `other`. Returns how many were removed.
    pub fn except_with<I: IntoIterator<Item = V>>(&self, other: I) -> usize {
        let removing: Vec<V> = other.into_iter().collect();
        if removing.is_empty() {
            return 0;
        }
        self.edit(|c| removing.iter().filter(|v| c.remove(v)).count())
    }

    /// Keep values present in exactly one of `self` and `other`.
    ///
    /// A non-empty toggle always changes the contents, even when the size
    /// stays the same, so it goes through `rewrite` to move the versions.
    pub fn symmetric_except_with<I: IntoIterator<Item = V>>(&self, other: I) {
        let toggle: UniqueSet<V, H> = other.into_iter().collect();
        if toggle.is_empty() {
            return;
        }
        let _ = self.rewrite(|c| {
            let mut incoming = Vec::new();
            for v in toggle {
                if !c.remove(&v) {
                    incoming.push(v);
                }
            }
            for v in incoming {
                c.insert(v);
            }
            Ok(())
        });
    }

    pub fn is_subset_of<I: IntoIterator<Item = V>>(&self, other: I) -> bool {
        let other: UniqueSet<V, H> = other.into_iter().collect();
        self.with(|c| c.iter().all(|v| other.contains(v)))
    }

    pub fn is_superset_of<I: IntoIterator<Item = V>>(&self, other: I) -> bool {
        let other: Vec<V> = other.into_iter().collect();
        self.with(|c| other.iter().all(|v| c.contains(v)))
    }

    pub fn overlaps<I: IntoIterator<Item = V>>(&self, other: I) -> bool {
        let other: Vec<V> = other.into_iter().collect();
        self.with(|c| other.iter().any(|v| c.contains(v)))
    }

    pub fn set_equals<I: IntoIterator<Item = V>>(&self, other: I) -> bool {
        let other: UniqueSet<V, H> = other.into_iter().collect();
        self.with(|c| c.len() == other.len() && c.iter().all(|v| other.contains(v)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, ListMultiMap, SetMultiMap};

    fn list() -> ListMultiMap<u8, i32> {
        let _ = env_logger::builder().is_test(true).try_init();
        ListMultiMap::new()
    }

    /// Invariant: an empty view of an absent key reads as empty and attaches
    /// on its first insertion; removing its last value detaches it again.
    #[test]
    fn empty_view_attaches_on_first_insert() {
        let d = list();
        let v = d.view(1);
        assert!(v.is_empty());
        assert!(!v.is_attached());
        assert!(!d.contains_key(&1));

        v.push(10);
        assert!(v.is_attached());
        assert_eq!(d.view(1).to_vec(), [10]);
        assert_eq!((d.len(), d.value_count()), (1, 1));

        assert!(v.remove(&10));
        assert!(!d.contains_key(&1));
        assert_eq!(d.value_count(), 0);
    }

    /// Invariant: two detached handles on one key share storage once either
    /// of them attaches.
    #[test]
    fn detached_handles_on_one_key_agree() {
        let d = list();
        let a = d.view(3);
        let b = d.view(3);
        a.push(1);
        b.push(2);
        assert_eq!(a.to_vec(), [1, 2]);
        assert_eq!(b.to_vec(), [1, 2]);
        assert!(a == b);
        assert_eq!(d.value_count(), 2);
    }

    /// Invariant: a view whose key was removed while it held values keeps
    /// them privately; the map does not see its edits.
    #[test]
    fn orphaned_view_edits_privately() {
        let d = list();
        let v = d.view(1);
        v.extend([1, 2]);
        assert!(d.remove(&1));
        assert_eq!(v.to_vec(), [1, 2]);
        v.push(3);
        assert_eq!(v.len(), 3);
        assert!(!d.contains_key(&1));
        assert_eq!(d.value_count(), 0);

        d.add(1, 9);
        assert!(v != d.view(1));
        assert!(v.clear());
        // Emptied again: resolves to the key's current storage.
        assert_eq!(v.to_vec(), [9]);
        assert!(v == d.view(1));
    }

    #[test]
    fn list_positional_ops() {
        let d = list();
        let v = d.view(1);
        assert_eq!(v.insert(1, 5), Err(Error::KeyNotFound));
        assert_eq!(v.remove_at(0), Err(Error::KeyNotFound));
        v.insert(0, 5).unwrap();
        v.insert_range(1, [6, 7, 8]).unwrap();
        assert_eq!(v.to_vec(), [5, 6, 7, 8]);
        assert_eq!(v.get(4), Err(Error::IndexOutOfRange { index: 4, len: 4 }));
        assert_eq!(v.set(0, 50), Ok(5));
        assert_eq!(v.remove_at(1), Ok(6));
        assert_eq!(
            v.remove_range(1, 5),
            Err(Error::InvalidRange {
                index: 1,
                count: 5,
                len: 3
            })
        );
        v.remove_range(0, 2).unwrap();
        assert_eq!(v.to_vec(), [8]);
        assert_eq!(d.value_count(), 1);
        v.remove_range(0, 1).unwrap();
        assert!(!d.contains_key(&1));
    }

    #[test]
    fn list_searches_and_reorders() {
        let d = list();
        let v = d.view(2);
        v.extend([3, 1, 3, 2]);
        assert_eq!(v.index_of(&3), Some(0));
        assert_eq!(v.last_index_of(&3), Some(2));
        assert_eq!((v.first(), v.last()), (Some(3), Some(2)));
        v.sort();
        assert_eq!(v.to_vec(), [1, 2, 3, 3]);
        v.reverse();
        assert_eq!(v.to_vec(), [3, 3, 2, 1]);
        assert_eq!(v.retain(|&x| x != 3), 2);
        assert_eq!(d.value_count(), 2);
        v.sort_by(|a, b| b.cmp(a));
        assert_eq!(v.to_vec(), [2, 1]);
    }

    /// Invariant: reordering a non-empty view invalidates its enumerators;
    /// a failed positional write does not.
    #[test]
    fn view_iter_fails_fast_on_reorder() {
        let d = list();
        let v = d.view(1);
        v.extend([2, 1]);
        let mut it = v.iter();
        assert_eq!(it.next(), Some(Ok(2)));
        assert!(v.set(9, 0).is_err());
        assert_eq!(it.next(), Some(Ok(1)));

        let mut it = v.iter();
        assert_eq!(it.next(), Some(Ok(2)));
        v.sort();
        assert_eq!(it.next(), Some(Err(Error::ConcurrentModification)));
        assert_eq!(it.next(), None);
    }

    /// Invariant: bulk input may come from the same map.
    #[test]
    fn extend_from_own_enumerator() {
        let d = list();
        let v = d.view(1);
        v.extend([1, 2]);
        v.extend(v.iter().map(|x| x.unwrap() * 10));
        assert_eq!(v.to_vec(), [1, 2, 10, 20]);
        assert_eq!(d.value_count(), 4);
    }

    #[test]
    fn set_algebra_tracks_attachment() {
        let d: SetMultiMap<&str, u32> = SetMultiMap::new();
        let s = d.view("k");
        assert_eq!(s.union_with([1, 2, 2, 3]), 3);
        assert!(d.contains_key("k"));
        assert!(!s.insert(2));
        assert_eq!(s.intersect_with([2, 3, 4]), 1);
        assert_eq!(s.to_vec(), [2, 3]);
        s.symmetric_except_with([3, 5]);
        assert!(s.set_equals([2, 5]));
        assert!(s.is_subset_of([1, 2, 5]));
        assert!(s.is_superset_of([5]));
        assert!(s.overlaps([9, 2]));
        assert_eq!(d.value_count(), 2);
        assert_eq!(s.except_with([2, 5, 7]), 2);
        assert!(!d.contains_key("k"));
        assert_eq!(d.value_count(), 0);
    }

    /// Invariant: a same-size toggle still invalidates live enumerators over
    /// the map and over the view.
    #[test]
    fn same_size_toggle_invalidates_enumerators() {
        let d: SetMultiMap<u8, u32> = SetMultiMap::new();
        let s = d.view(1);
        s.union_with([1, 2]);
        let version = d.version();
        let mut values = d.values().iter();
        let mut own = s.iter();
        assert_eq!(values.next(), Some(Ok(1)));
        assert_eq!(own.next(), Some(Ok(1)));

        s.symmetric_except_with([1, 3]);
        assert_eq!(s.len(), 2);
        assert!(s.set_equals([2, 3]));
        assert!(d.version() > version);
        assert_eq!(values.collect::<Vec<_>>(), [Err(Error::ConcurrentModification)]);
        assert_eq!(own.collect::<Vec<_>>(), [Err(Error::ConcurrentModification)]);
    }

    /// Invariant: a toggle on an absent key attaches it like any insertion.
    #[test]
    fn toggle_on_absent_key_attaches() {
        let d: SetMultiMap<u8, u32> = SetMultiMap::new();
        d.view(4).symmetric_except_with([7]);
        assert!(d.contains_key(&4));
        assert_eq!(d.value_count(), 1);
        d.view(4).symmetric_except_with([7]);
        assert!(!d.contains_key(&4));
        assert_eq!(d.value_count(), 0);
    }

    /// Invariant: mutating a key from inside `with` panics and leaves the map
    /// usable.
    #[test]
    fn mutation_inside_with_panics() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let d = list();
        let v = d.view(1);
        v.push(1);
        let res = catch_unwind(AssertUnwindSafe(|| v.with(|_| v.push(2))));
        assert!(res.is_err());
        assert_eq!(v.to_vec(), [1]);
        v.push(3);
        assert_eq!(d.value_count(), 2);
    }

    #[test]
    fn identity_is_owner_and_storage() {
        let d = list();
        let e = list();
        d.add(1, 1);
        e.add(1, 1);
        assert!(d.view(1) == d.view(1));
        assert!(d.view(1) != e.view(1));
        assert!(d.view(1) != d.view(2));
        assert_eq!(*d.view(1).key(), 1);
    }
}
