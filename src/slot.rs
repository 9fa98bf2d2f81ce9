//! Shared per-key storage and its attachment state.

use crate::backing::Handle;
use crate::collection::ValueCollection;
use core::cell::{Cell, Ref, RefCell};

/// Whether a slot is currently linked into its owner's backing map.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Attachment {
    Detached,
    Attached(Handle),
}

/// Storage for one key. Shared by the backing map (while attached) and by
/// every `ValueView` handed out for the key.
///
/// Invariant: `attachment` is `Attached` iff the owner's index holds this
/// exact `Rc<Slot>`; an attached slot is never empty.
pub(crate) struct Slot<K, C> {
    key: K,
    hash: u64,
    values: RefCell<C>,
    attachment: Cell<Attachment>,
    // Bumped on every mutation that changes this slot's contents.
    version: Cell<u64>,
}

impl<K, C: ValueCollection> Slot<K, C> {
    pub(crate) fn new(key: K, hash: u64) -> Self {
        Self {
            key,
            hash,
            values: RefCell::new(C::default()),
            attachment: Cell::new(Attachment::Detached),
            version: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub(crate) fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub(crate) fn attachment(&self) -> Attachment {
        self.attachment.get()
    }

    #[inline]
    pub(crate) fn set_attachment(&self, a: Attachment) {
        self.attachment.set(a)
    }

    #[inline]
    pub(crate) fn is_attached(&self) -> bool {
        matches!(self.attachment.get(), Attachment::Attached(_))
    }

    #[inline]
    pub(crate) fn version(&self) -> u64 {
        self.version.get()
    }

    #[inline]
    pub(crate) fn bump_version(&self) {
        self.version.set(self.version.get() + 1)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.values.borrow().len()
    }

    #[inline]
    pub(crate) fn values(&self) -> Ref<'_, C> {
        self.values.borrow()
    }

    /// Run `op` on the contents and report `(result, len_before, len_after)`.
    /// Attachment bookkeeping is left to the caller.
    pub(crate) fn edit<R>(&self, op: impl FnOnce(&mut C) -> R) -> (R, usize, usize) {
        let mut values = self.values.borrow_mut();
        let before = values.len();
        let out = op(&mut values);
        let after = values.len();
        (out, before, after)
    }
}
