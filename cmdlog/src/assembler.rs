//! Command assembler
//!
//! Turns a sequence of arbitrary write chunks into delimiter-terminated
//! commands. Bytes are accumulated in a [`PendingBuffer`] until a chunk
//! contains the delimiter; that chunk completes exactly one command.
//!
//! # Bytes after the first delimiter
//!
//! Only the first delimiter of a chunk is honoured. Whatever follows it in
//! the same chunk is neither stored nor kept pending, and is not counted in
//! [`Appended::accepted`]. A caller that treats a short count as "write the
//! rest again" (as `write_all` does) still gets every command stored, one
//! call per command.

use crate::io::{BufferError, Entry, PendingBuffer};

/// Outcome of a single [`CommandAssembler::append`] call
#[derive(Debug, PartialEq, Eq)]
pub struct Appended {
    /// Bytes of the chunk consumed by this call
    pub accepted: usize,
    /// The command completed by this call, if the chunk held a delimiter
    pub command: Option<Entry>,
}

impl Appended {
    fn nothing() -> Self {
        Self {
            accepted: 0,
            command: None,
        }
    }
}

/// Accumulates write chunks into delimiter-terminated commands
pub struct CommandAssembler {
    pending: PendingBuffer,
    delimiter: u8,
}

impl CommandAssembler {
    #[must_use]
    pub fn new(delimiter: u8) -> Self {
        Self {
            pending: PendingBuffer::new(),
            delimiter,
        }
    }

    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Bytes waiting for a delimiter
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        self.pending.as_bytes()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed one chunk
    ///
    /// - Empty chunk: no-op, accepted 0.
    /// - No delimiter: the whole chunk becomes pending, accepted `chunk.len()`.
    /// - Delimiter at `d`: pending + `chunk[..=d]` is returned as a command,
    ///   pending becomes empty, accepted `d + 1`. The rest of the chunk is dropped.
    ///
    /// # Errors
    /// Returns `BufferError::OutOfMemory` if the pending buffer cannot grow.
    /// The pending bytes are unchanged in that case.
    pub fn append(&mut self, chunk: &[u8]) -> Result<Appended, BufferError> {
        if chunk.is_empty() {
            return Ok(Appended::nothing());
        }

        let Some(d) = chunk.iter().position(|&b| b == self.delimiter) else {
            self.pending.append(chunk)?;
            log::trace!(
                "assembler: absorbed {} bytes, pending {}",
                chunk.len(),
                self.pending.len()
            );
            return Ok(Appended {
                accepted: chunk.len(),
                command: None,
            });
        };

        // `d` was found inside `chunk`, so `..=d` is in bounds
        #[allow(clippy::indexing_slicing)]
        let head = &chunk[..=d];
        let command = self.pending.complete(head)?;
        if d + 1 < chunk.len() {
            log::debug!(
                "assembler: dropped {} bytes after the delimiter",
                chunk.len() - d - 1
            );
        }
        Ok(Appended {
            accepted: d + 1,
            command: Some(command),
        })
    }

    /// Release the pending bytes, returning how many there were
    pub fn discard_pending(&mut self) -> usize {
        self.pending.clear()
    }
}

impl std::fmt::Debug for CommandAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CommandAssembler(delimiter={:?}, pending={})",
            char::from(self.delimiter),
            self.pending.len()
        )
    }
}
