//! Error type shared by every fallible operation.

use core::fmt;

/// Failures reported synchronously to the caller. Nothing is retried.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// A position-based operation addressed a key that has no values.
    KeyNotFound,
    /// An index-addressed access fell outside `0..len` (or `0..=len` for inserts).
    IndexOutOfRange { index: usize, len: usize },
    /// `index..index + count` does not lie within `0..=len`.
    InvalidRange { index: usize, count: usize, len: usize },
    /// A requested capacity is smaller than the number of stored elements.
    CapacityBelowLength { capacity: usize, len: usize },
    /// The map (or view) changed structurally since the enumerator was created.
    ConcurrentModification,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::KeyNotFound => f.write_str("key not found"),
            Error::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Error::InvalidRange { index, count, len } => write!(
                f,
                "range of {count} elements starting at {index} is invalid for length {len}"
            ),
            Error::CapacityBelowLength { capacity, len } => {
                write!(f, "capacity {capacity} is less than current length {len}")
            }
            Error::ConcurrentModification => {
                f.write_str("collection was modified; enumeration cannot continue")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Check `index < len`.
#[inline]
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange { index, len })
    }
}

/// Check that `index..index + count` is a valid sub-range of `0..len`.
#[inline]
pub(crate) fn check_range(index: usize, count: usize, len: usize) -> Result<()> {
    match index.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::InvalidRange { index, count, len }),
    }
}
