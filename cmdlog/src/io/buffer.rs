//! Owned command buffers
//!
//! Two move-only byte containers carry every command through the device:
//!
//! - [`PendingBuffer`] accumulates bytes of a command whose delimiter has not
//!   been seen yet. It grows with fallible allocation, so an out-of-memory
//!   condition is reported instead of aborting, and leaves the buffer intact.
//! - [`Entry`] is a completed command. It is immutable, never empty, and is
//!   not `Clone`: the only way to get one is to complete a pending buffer,
//!   and the only way to release its bytes is to drop it.

use std::fmt;
use std::ops::Deref;

/// Error type for buffer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Growing the buffer by `requested` bytes failed
    OutOfMemory { requested: usize },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "Buffer error: cannot allocate {requested} more bytes")
            }
        }
    }
}

impl std::error::Error for BufferError {}

/// Reserve room for `additional` bytes or report out-of-memory
///
/// On failure the vector is left exactly as it was.
pub(crate) fn try_grow(buf: &mut Vec<u8>, additional: usize) -> Result<(), BufferError> {
    let out_of_memory = BufferError::OutOfMemory {
        requested: additional,
    };
    if growth_denied() {
        return Err(out_of_memory);
    }
    buf.try_reserve_exact(additional).map_err(|_| out_of_memory)
}

#[cfg(not(test))]
#[inline]
fn growth_denied() -> bool {
    false
}

#[cfg(test)]
thread_local! {
    /// Growths allowed on this thread before `try_grow` starts failing
    static GROWTH_BUDGET: std::cell::Cell<Option<usize>> = const { std::cell::Cell::new(None) };
}

#[cfg(test)]
fn growth_denied() -> bool {
    GROWTH_BUDGET.with(|budget| match budget.get() {
        Some(0) => true,
        Some(n) => {
            budget.set(Some(n - 1));
            false
        }
        None => false,
    })
}

/// Let the next `n` growths on this thread succeed and fail the ones after
#[cfg(test)]
pub(crate) fn fail_growth_after(n: usize) {
    GROWTH_BUDGET.with(|budget| budget.set(Some(n)));
}

#[cfg(test)]
pub(crate) fn restore_growth() {
    GROWTH_BUDGET.with(|budget| budget.set(None));
}

/// A completed, stored command
///
/// Includes the trailing delimiter byte. The length is always greater than zero.
#[derive(PartialEq, Eq)]
pub struct Entry(Box<[u8]>);

impl Entry {
    /// Number of bytes in the command
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with slices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Entry {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Entry {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entry(len={}, {:?})",
            self.0.len(),
            String::from_utf8_lossy(&self.0)
        )
    }
}

/// Bytes of a command that is still waiting for its delimiter
#[derive(Default)]
pub struct PendingBuffer(Vec<u8>);

impl PendingBuffer {
    /// Create a new empty pending buffer
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Append data to the tail
    ///
    /// Grows by exactly `data.len()` bytes or fails without touching the
    /// current contents.
    pub fn append(&mut self, data: &[u8]) -> Result<(), BufferError> {
        try_grow(&mut self.0, data.len())?;
        self.0.extend_from_slice(data);
        Ok(())
    }

    /// Finish the command with `tail` and take ownership of the result
    ///
    /// `tail` must end with the delimiter, so the returned entry is never
    /// empty. On success the pending buffer is empty again. On failure
    /// nothing changes.
    pub fn complete(&mut self, tail: &[u8]) -> Result<Entry, BufferError> {
        debug_assert!(!tail.is_empty(), "a command ends with its delimiter");
        try_grow(&mut self.0, tail.len())?;
        self.0.extend_from_slice(tail);
        let bytes = std::mem::take(&mut self.0);
        Ok(Entry(bytes.into_boxed_slice()))
    }

    /// Drop the accumulated bytes, returning how many were released
    pub fn clear(&mut self) -> usize {
        let released = self.0.len();
        self.0 = Vec::new();
        released
    }
}

impl fmt::Debug for PendingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PendingBuffer(len={})", self.0.len())
    }
}
