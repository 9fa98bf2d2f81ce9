//! BackingMap: structural layer mapping keys to attached slots.
//!
//! Layout follows a handle-based hash map: a `HashTable` of generational
//! slotmap keys indexes a `SlotMap` of entries. Each entry records its
//! position in a dense `order` vector so enumerators can walk the attached
//! keys by position without borrowing the map between steps. Every slot
//! carries the hash computed when it was created; relinking and unlinking
//! use that stored hash and never call `K: Hash` again.

use crate::collection::ValueCollection;
use crate::error::{Error, Result};
use crate::reentrancy::DebugReentrancy;
use crate::slot::{Attachment, Slot};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash, Hasher};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;
use std::rc::Rc;

/// Stable reference to an attached entry. Generational: a handle to a
/// detached entry never resolves to an entry attached later.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

struct Entry<K, C> {
    slot: Rc<Slot<K, C>>,
    // Index into `BackingMap::order`.
    position: usize,
}

pub struct BackingMap<K, C, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    entries: SlotMap<DefaultKey, Entry<K, C>>,
    order: Vec<DefaultKey>,
    value_count: usize,
    version: u64,
    reentrancy: DebugReentrancy,
}

impl<K, C, S> BackingMap<K, C, S>
where
    K: Eq + Hash,
    C: ValueCollection,
    S: BuildHasher,
{
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::with_capacity(capacity),
            entries: SlotMap::with_capacity_and_key(capacity),
            order: Vec::with_capacity(capacity),
            value_count: 0,
            version: 0,
            reentrancy: DebugReentrancy::new(),
        }
    }

    #[inline]
    pub fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Hash with a caller-driven feed; equals `make_hash(k)` when `feed`
    /// writes exactly what `k.hash()` would.
    pub fn hash_with(&self, feed: impl FnOnce(&mut S::Hasher)) -> u64 {
        let mut state = self.hasher.build_hasher();
        feed(&mut state);
        state.finish()
    }

    /// Number of attached keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of the sizes of all attached slots.
    #[inline]
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn find<Q>(&self, q: &Q) -> Option<&Rc<Slot<K, C>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.find_hashed(hash, |k| k.borrow() == q)
    }

    /// Probe with a precomputed hash and a caller-supplied key predicate.
    pub(crate) fn find_hashed(
        &self,
        hash: u64,
        mut matches: impl FnMut(&K) -> bool,
    ) -> Option<&Rc<Slot<K, C>>> {
        let _g = self.reentrancy.enter("find");
        let entries = &self.entries;
        let &k = self.index.find(hash, |&k| {
            entries
                .get(k)
                .map(|e| matches(e.slot.key()))
                .unwrap_or(false)
        })?;
        self.entries.get(k).map(|e| &e.slot)
    }

    pub(crate) fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    /// The attached slot for `key`, or a fresh detached one bound to it.
    pub(crate) fn slot_for(&self, key: K) -> Rc<Slot<K, C>> {
        let hash = self.make_hash(&key);
        match self.find_hashed(hash, |k| *k == key) {
            Some(slot) => Rc::clone(slot),
            None => Rc::new(Slot::new(key, hash)),
        }
    }

    /// The slot a view bound to `slot` should act on. A detached empty slot
    /// defers to whatever slot is attached under the same key; attached slots
    /// and orphaned (detached, non-empty) slots act on themselves.
    pub(crate) fn resolve(&self, slot: &Rc<Slot<K, C>>) -> Rc<Slot<K, C>> {
        if slot.is_attached() || slot.len() > 0 {
            return Rc::clone(slot);
        }
        match self.find_hashed(slot.hash(), |k| k == slot.key()) {
            Some(live) => Rc::clone(live),
            None => Rc::clone(slot),
        }
    }

    #[inline]
    pub(crate) fn slot_at(&self, position: usize) -> Option<&Rc<Slot<K, C>>> {
        let k = *self.order.get(position)?;
        self.entries.get(k).map(|e| &e.slot)
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = &Rc<Slot<K, C>>> + '_ {
        self.order
            .iter()
            .filter_map(move |&k| self.entries.get(k).map(|e| &e.slot))
    }

    /// Apply an element-wise edit to `slot` and account for it.
    pub(crate) fn edit_slot<R>(
        &mut self,
        slot: &Rc<Slot<K, C>>,
        op: impl FnOnce(&mut C) -> R,
    ) -> R {
        let (out, before, after) = slot.edit(op);
        self.settle(slot, before, after, false);
        out
    }

    /// Apply an edit that may reorder or overwrite elements without changing
    /// the count. The version moves only when `op` succeeds.
    pub(crate) fn rewrite_slot<R>(
        &mut self,
        slot: &Rc<Slot<K, C>>,
        op: impl FnOnce(&mut C) -> Result<R>,
    ) -> Result<R> {
        let (out, before, after) = slot.edit(op);
        self.settle(slot, before, after, out.is_ok());
        out
    }

    /// Bring counts, versions and attachment in line with an edit of `slot`
    /// that took it from `before` to `after` elements.
    ///
    /// - attached, count changed: adjust `value_count`, bump the version,
    ///   detach on reaching zero;
    /// - detached, 0 -> n: attach;
    /// - detached and already non-empty (orphaned): private edit, the map
    ///   does not see it.
    pub(crate) fn settle(
        &mut self,
        slot: &Rc<Slot<K, C>>,
        before: usize,
        after: usize,
        rewritten: bool,
    ) {
        let changed = before != after || (rewritten && after > 0);
        if !changed {
            return;
        }
        slot.bump_version();
        match slot.attachment() {
            Attachment::Attached(handle) => {
                self.value_count = self.value_count - before + after;
                self.version += 1;
                if after == 0 {
                    self.unlink(handle);
                    log::trace!("multimap: detached emptied view ({} keys left)", self.len());
                }
            }
            Attachment::Detached => {
                if before == 0 && after > 0 {
                    self.link(slot);
                    self.value_count += after;
                    self.version += 1;
                    log::trace!("multimap: attached view ({} keys)", self.len());
                }
            }
        }
    }

    /// Remove the whole entry for `slot`; its contents stay with the slot.
    /// Returns the number of values the map lost.
    pub(crate) fn remove_slot(&mut self, slot: &Rc<Slot<K, C>>) -> usize {
        let Attachment::Attached(handle) = slot.attachment() else {
            return 0;
        };
        let n = slot.len();
        self.unlink(handle);
        self.value_count -= n;
        self.version += 1;
        slot.bump_version();
        log::trace!("multimap: removed key with {n} values");
        n
    }

    /// Empty and detach every slot.
    pub(crate) fn clear(&mut self) {
        if self.order.is_empty() {
            return;
        }
        for (_, e) in self.entries.drain() {
            let _ = e.slot.edit(|c| c.clear_values());
            e.slot.set_attachment(Attachment::Detached);
            e.slot.bump_version();
        }
        self.index.clear();
        self.order.clear();
        self.value_count = 0;
        self.version += 1;
        log::trace!("multimap: cleared");
    }

    fn link(&mut self, slot: &Rc<Slot<K, C>>) {
        let _g = self.reentrancy.enter("attach");
        debug_assert!(!slot.is_attached());
        let hash = slot.hash();
        let k = self.entries.insert(Entry {
            slot: Rc::clone(slot),
            position: self.order.len(),
        });
        self.order.push(k);
        let entries = &self.entries;
        self.index.insert_unique(hash, k, |&kk| {
            entries.get(kk).map(|e| e.slot.hash()).unwrap_or(0)
        });
        slot.set_attachment(Attachment::Attached(Handle(k)));
    }

    fn unlink(&mut self, handle: Handle) -> Option<Rc<Slot<K, C>>> {
        let _g = self.reentrancy.enter("detach");
        let k = handle.0;
        let entry = self.entries.remove(k)?;

        // Unlink from the index by identity; no user code runs here.
        if let Ok(occupied) = self.index.find_entry(entry.slot.hash(), |&kk| kk == k) {
            occupied.remove();
        }

        self.order.swap_remove(entry.position);
        if let Some(&moved) = self.order.get(entry.position) {
            if let Some(e) = self.entries.get_mut(moved) {
                e.position = entry.position;
            }
        }
        entry.slot.set_attachment(Attachment::Detached);
        Some(entry.slot)
    }

    pub fn capacity(&self) -> usize {
        self.index.capacity().min(self.entries.capacity())
    }

    pub fn reserve(&mut self, additional: usize) {
        let entries = &self.entries;
        self.index.reserve(additional, |&kk| {
            entries.get(kk).map(|e| e.slot.hash()).unwrap_or(0)
        });
        self.entries.reserve(additional);
        self.order.reserve(additional);
    }

    /// Shrink the key index to hold at least `capacity` keys.
    pub fn trim_to(&mut self, capacity: usize) -> Result<()> {
        if capacity < self.len() {
            return Err(Error::CapacityBelowLength {
                capacity,
                len: self.len(),
            });
        }
        let entries = &self.entries;
        self.index.shrink_to(capacity, |&kk| {
            entries.get(kk).map(|e| e.slot.hash()).unwrap_or(0)
        });
        self.order.shrink_to(capacity);
        log::debug!("multimap: trimmed key capacity to {}", self.capacity());
        Ok(())
    }

    /// Apply `f` to the storage of every attached slot. `f` must not change
    /// element counts.
    pub(crate) fn for_each_values(&self, mut f: impl FnMut(&mut C)) {
        for slot in self.slots() {
            let (_, before, after) = slot.edit(&mut f);
            debug_assert_eq!(before, after);
        }
    }
}
