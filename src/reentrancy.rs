//! Debug-only reentrancy guard for the backing map.
//!
//! User `Eq`/`Hash` code runs while the backing map probes its index. If that
//! code reaches back into the same map, the index may be observed half-way
//! through an operation. Debug builds detect this and panic naming both the
//! operation in progress and the one that tried to enter; release builds
//! compile the guard away.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

/// Per-map tracker. Guard entry points with `let _g = self.guard.enter("op");`.
#[derive(Debug)]
pub struct DebugReentrancy {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // !Send + !Sync, like the map that embeds it.
    _single_thread: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _single_thread: PhantomData,
        }
    }

    /// Enter the guarded section for `op`. Panics in debug builds when another
    /// guarded section of the same map is still running.
    #[inline]
    pub fn enter(&self, op: &'static str) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("reentrancy detected: `{op}` entered the map while `{outer}` was running");
            }
            self.active.set(Some(op));
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            ReentrancyGuard { _owner: PhantomData }
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`DebugReentrancy::enter`].
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _owner: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.owner.active.get().is_some());
            self.owner.active.set(None);
        }
    }
}
