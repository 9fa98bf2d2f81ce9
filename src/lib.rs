//! rc-multimap: A single-threaded multi-value map whose per-key
//! collections are live views that attach to and detach from the map as
//! they gain and lose values.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a key is present iff its collection is non-empty, no matter
//!   which handle (the map, a view, an alternate-key accessor) made the
//!   change.
//! - Layers:
//!   - Slot<K, C>: the storage for one key; the key, its precomputed hash,
//!     the collection `C`, its attachment state and a per-slot version.
//!   - BackingMap<K, C, S>: structural map from key to attached slot;
//!     keeps the aggregate value count and a version stamp, and attaches
//!     or detaches a slot whenever an edit moves it across empty. Includes
//!     a debug-only reentrancy guard around probes.
//!   - MultiMap<K, C, S>: public API over a shared `BackingMap`; hands out
//!     `ValueView`s, aggregate views, fail-fast enumerators, alternate-key
//!     accessors and read-only façades.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (shared through `Rc`, mutated
//!   through `RefCell`/`Cell`).
//! - Stable, generational keys behind small `Handle` wrappers: detaching a
//!   view is O(1) and never re-hashes its key.
//! - O(1) average lookups; the value count is maintained, not recomputed.
//! - Every structural change moves the version; enumerators check it on
//!   each step and fail with `Error::ConcurrentModification`.
//!
//! Detached views
//! - Reading an absent key yields an empty, detached view. While empty it
//!   resolves to whatever slot is attached under its key, so two handles on
//!   one key never attach competing storage. The first insertion through
//!   it attaches it.
//! - Removing a key whose view still holds values orphans that view: it
//!   keeps its contents and edits them privately. Once emptied it behaves
//!   like any fresh detached view.
//!
//! Reentrancy policy
//! - Mutations hold the map's `RefCell` for their whole duration, so user
//!   code they run (`Eq`, `Hash`, `sort_by` comparators) cannot reenter
//!   the same map; doing so panics with a `BorrowMutError`.
//! - Probes additionally run under `DebugReentrancy`, which names both
//!   operations in debug builds.
//! - `ValueView::with` keeps the key's contents borrowed while its closure
//!   runs; mutating that key from inside the closure panics.
//!
//! Hasher invariant
//! - Each slot stores its `u64` hash, computed once with the map's
//!   `BuildHasher` when the view is created. Indexing and rehashing use the
//!   stored hash only.
//!
//! Notes and non-goals
//! - No thread-safety, no persistence.
//! - `MultiMap` does not implement `Clone`: views would be ambiguous about
//!   which map they belong to.

mod aggregate;
mod alternate;
mod backing;
mod collection;
mod error;
mod iter;
mod map;
mod multimap_proptest;
mod read_only;
mod reentrancy;
mod slot;
mod view;

// Public surface
pub use aggregate::{CollectionsView, KeysView, ValuesView};
pub use alternate::{AlternateKey, AlternateLookup, ByBorrow};
pub use collection::{IntoIter as UniqueSetIntoIter, UniqueSet, ValueCollection};
pub use error::{Error, Result};
pub use iter::{CollectionsIter, Iter, KeysIter, ValuesIter, ViewIter};
pub use map::{ListMultiMap, MultiMap, SetMultiMap};
pub use read_only::{
    CollectionLookup, ReadAggregate, ReadList, ReadMultiMap, ReadOnly, ReadValues,
};
pub use view::ValueView;
