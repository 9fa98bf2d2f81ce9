//! Lookup by a non-canonical key representation.
//!
//! An `AlternateKey<K>` is a cross-type equality/hash relation between some
//! alternate form and the canonical key `K`. It is supplied once, when the
//! `AlternateLookup` accessor is created, and used for every call made
//! through it. The backing map stays the single source of truth: every
//! operation here returns exactly what the canonical operation would return
//! after materializing the key.
//!
//! Probe-only operations never materialize a canonical key. Mutations that
//! match an existing key return that key, since the caller has no other way
//! to obtain it.

use crate::backing::BackingMap;
use crate::collection::ValueCollection;
use crate::map::MultiMap;
use crate::slot::Slot;
use crate::view::ValueView;
use core::borrow::Borrow;
use core::cell::RefCell;
use core::hash::{BuildHasher, Hash, Hasher};
use core::marker::PhantomData;
use std::rc::Rc;

/// Equality/hash relation between an alternate key form and `K`.
///
/// `hash` must feed the hasher exactly what `K::hash` feeds it for every key
/// that `matches` the alternate; otherwise lookups miss.
pub trait AlternateKey<K> {
    type Alternate: ?Sized;

    fn hash<H: Hasher>(&self, alternate: &Self::Alternate, state: &mut H);

    fn matches(&self, alternate: &Self::Alternate, key: &K) -> bool;

    /// Build the canonical key; only called when a key must be stored.
    fn to_key(&self, alternate: &Self::Alternate) -> K;
}

/// The relation given by `K: Borrow<Q>`.
pub struct ByBorrow<Q: ?Sized>(PhantomData<fn(&Q)>);

impl<Q: ?Sized> ByBorrow<Q> {
    pub fn new() -> Self {
        ByBorrow(PhantomData)
    }
}

impl<Q: ?Sized> Default for ByBorrow<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: ?Sized> Clone for ByBorrow<Q> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<Q: ?Sized> Copy for ByBorrow<Q> {}

impl<K, Q> AlternateKey<K> for ByBorrow<Q>
where
    K: Borrow<Q>,
    Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
{
    type Alternate = Q;

    #[inline]
    fn hash<H: Hasher>(&self, alternate: &Q, state: &mut H) {
        alternate.hash(state)
    }

    #[inline]
    fn matches(&self, alternate: &Q, key: &K) -> bool {
        key.borrow() == alternate
    }

    #[inline]
    fn to_key(&self, alternate: &Q) -> K {
        alternate.to_owned()
    }
}

/// Accessor that probes a `MultiMap` with alternate keys.
pub struct AlternateLookup<'a, K, C, S, A> {
    map: &'a MultiMap<K, C, S>,
    comparer: A,
}

impl<'a, K, C, S, A> AlternateLookup<'a, K, C, S, A>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
    A: AlternateKey<K>,
{
    pub(crate) fn new(map: &'a MultiMap<K, C, S>, comparer: A) -> Self {
        Self { map, comparer }
    }

    pub fn map(&self) -> &'a MultiMap<K, C, S> {
        self.map
    }

    pub fn comparer(&self) -> &A {
        &self.comparer
    }

    fn find_in(
        &self,
        backing: &BackingMap<K, C, S>,
        alternate: &A::Alternate,
    ) -> Option<Rc<Slot<K, C>>> {
        let hash = backing.hash_with(|state| self.comparer.hash(alternate, state));
        backing
            .find_hashed(hash, |k| self.comparer.matches(alternate, k))
            .map(Rc::clone)
    }

    fn find(&self, alternate: &A::Alternate) -> Option<Rc<Slot<K, C>>> {
        self.find_in(&RefCell::borrow(self.map.shared()), alternate)
    }

    fn view_of(&self, slot: Rc<Slot<K, C>>) -> ValueView<K, C, S> {
        ValueView::new(Rc::clone(self.map.shared()), slot)
    }

    pub fn contains_key(&self, alternate: &A::Alternate) -> bool {
        self.find(alternate).is_some()
    }

    pub fn contains(&self, alternate: &A::Alternate, value: &C::Item) -> bool {
        self.find(alternate)
            .is_some_and(|slot| slot.values().contains_value(value))
    }

    pub fn value_count_of(&self, alternate: &A::Alternate) -> usize {
        self.find(alternate).map_or(0, |slot| slot.len())
    }

    /// The collection for the matching key, if present.
    pub fn try_get_values(&self, alternate: &A::Alternate) -> Option<ValueView<K, C, S>> {
        self.find(alternate).map(|slot| self.view_of(slot))
    }

    /// The matching key and its collection, if present.
    pub fn get_key_value(&self, alternate: &A::Alternate) -> Option<(K, ValueView<K, C, S>)>
    where
        K: Clone,
    {
        let slot = self.find(alternate)?;
        let key = slot.key().clone();
        Some((key, self.view_of(slot)))
    }

    /// The collection for the matching key. Materializes a canonical key only
    /// when nothing matches.
    pub fn view(&self, alternate: &A::Alternate) -> ValueView<K, C, S> {
        match self.find(alternate) {
            Some(slot) => self.view_of(slot),
            None => self.map.view(self.comparer.to_key(alternate)),
        }
    }

    /// Add `value` under the matching key, materializing a canonical key only
    /// when nothing matches. Returns the canonical key the value went under
    /// and whether the collection accepted it.
    pub fn add(&self, alternate: &A::Alternate, value: C::Item) -> (K, bool)
    where
        K: Clone,
    {
        let mut backing = self.map.shared().borrow_mut();
        let slot = match self.find_in(&backing, alternate) {
            Some(slot) => slot,
            None => backing.slot_for(self.comparer.to_key(alternate)),
        };
        let added = backing.edit_slot(&slot, |c| c.insert_value(value));
        (slot.key().clone(), added)
    }

    /// Remove the matching key with its whole collection; returns that key.
    pub fn remove(&self, alternate: &A::Alternate) -> Option<K>
    where
        K: Clone,
    {
        let mut backing = self.map.shared().borrow_mut();
        let slot = self.find_in(&backing, alternate)?;
        backing.remove_slot(&slot);
        Some(slot.key().clone())
    }

    /// Remove one occurrence of `value` under the matching key; returns that
    /// key when a value was removed.
    pub fn remove_value(&self, alternate: &A::Alternate, value: &C::Item) -> Option<K>
    where
        K: Clone,
    {
        let mut backing = self.map.shared().borrow_mut();
        let slot = self.find_in(&backing, alternate)?;
        backing
            .edit_slot(&slot, |c| c.remove_value(value))
            .then(|| slot.key().clone())
    }

    /// Empty the collection of the matching key; returns that key.
    pub fn clear_key(&self, alternate: &A::Alternate) -> Option<K>
    where
        K: Clone,
    {
        let mut backing = self.map.shared().borrow_mut();
        let slot = self.find_in(&backing, alternate)?;
        backing.edit_slot(&slot, |c| c.clear_values());
        Some(slot.key().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ListMultiMap;
    use std::cell::Cell;

    /// `String` keys probed with raw UTF-8 bytes. Counts materializations.
    #[derive(Default)]
    struct Utf8Bytes {
        made: Cell<usize>,
    }

    impl AlternateKey<String> for Utf8Bytes {
        type Alternate = [u8];

        fn hash<H: Hasher>(&self, alternate: &[u8], state: &mut H) {
            match core::str::from_utf8(alternate) {
                Ok(s) => s.hash(state),
                // Matches no key, any hash will do.
                Err(_) => state.write_u8(0),
            }
        }

        fn matches(&self, alternate: &[u8], key: &String) -> bool {
            key.as_bytes() == alternate
        }

        fn to_key(&self, alternate: &[u8]) -> String {
            self.made.set(self.made.get() + 1);
            String::from_utf8_lossy(alternate).into_owned()
        }
    }

    fn sample() -> ListMultiMap<String, u32> {
        let d = ListMultiMap::new();
        d.add_range("alpha".to_string(), [1, 2]);
        d.add_range("beta".to_string(), [3]);
        d
    }

    /// Invariant: alternate probes see exactly what canonical probes see and
    /// never build a key.
    #[test]
    fn probes_match_canonical_without_materializing() {
        let d = sample();
        let alt = d.alternate_lookup(Utf8Bytes::default());
        assert!(alt.contains_key(b"alpha"));
        assert!(!alt.contains_key(b"gamma"));
        assert!(!alt.contains_key(&[0xff, 0xfe]));
        assert!(alt.contains(b"alpha", &2));
        assert_eq!(alt.value_count_of(b"alpha"), d.value_count_of("alpha"));
        assert_eq!(
            alt.try_get_values(b"beta").map(|v| v.to_vec()),
            Some(vec![3])
        );
        assert_eq!(alt.view(b"alpha"), d.view("alpha".to_string()));
        assert_eq!(alt.comparer().made.get(), 0);
    }

    /// Invariant: a key is materialized only when an insertion needs one.
    #[test]
    fn add_materializes_only_on_miss() {
        let d = sample();
        let alt = d.alternate_lookup(Utf8Bytes::default());
        assert_eq!(alt.add(b"alpha", 9), ("alpha".to_string(), true));
        assert_eq!(alt.comparer().made.get(), 0);
        assert_eq!(alt.add(b"gamma", 4), ("gamma".to_string(), true));
        assert_eq!(alt.comparer().made.get(), 1);
        // Hit path again: the stored key comes back, nothing is built.
        assert_eq!(alt.add(b"gamma", 5), ("gamma".to_string(), true));
        assert_eq!(alt.comparer().made.get(), 1);
        assert_eq!(d.view("gamma".to_string()).to_vec(), [4, 5]);
        assert_eq!(d.value_count(), 6);
    }

    /// Invariant: successful mutating matches hand back the canonical key.
    #[test]
    fn mutations_return_matched_key() {
        let d = sample();
        let alt = d.alternate_lookup(Utf8Bytes::default());
        assert_eq!(alt.remove_value(b"alpha", &1), Some("alpha".to_string()));
        assert_eq!(alt.remove_value(b"alpha", &1), None);
        assert_eq!(alt.clear_key(b"alpha"), Some("alpha".to_string()));
        assert_eq!(alt.clear_key(b"alpha"), None);
        assert_eq!(alt.remove(b"beta"), Some("beta".to_string()));
        assert_eq!(alt.remove(b"beta"), None);
        assert!(d.is_empty());
    }

    #[test]
    fn by_borrow_matches_str_probes() {
        let d = sample();
        let alt = d.alternate_lookup(ByBorrow::<str>::new());
        assert!(alt.contains_key("beta"));
        let (k, v) = alt.get_key_value("alpha").expect("present");
        assert_eq!(k, "alpha");
        assert_eq!(v.to_vec(), [1, 2]);
        assert_eq!(alt.add("delta", 7), ("delta".to_string(), true));
        assert!(d.contains_key("delta"));
    }
}
