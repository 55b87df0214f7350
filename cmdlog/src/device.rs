//! The command log device
//!
//! [`CommandLog`] owns the device state (assembler + ring log) behind one
//! [`AccessGuard`] and exposes the four entry points a transport layer calls:
//! `open`, `release`, `write` and `read`.
//!
//! # Ownership of command bytes
//!
//! ```text
//!  caller ──copy──▶ local Vec ──append──▶ PendingBuffer
//!                                              │ complete()
//!                                              ▼
//!                                            Entry ──ingest──▶ RingLog slot
//!                                                                 │ evicted / shutdown
//!                                                                 ▼
//!                                                               dropped
//! ```
//!
//! Every step moves the buffer, so an entry is released exactly once.
//!
//! # Thread Safety
//!
//! `CommandLog` is `Sync`; share it by reference or `Arc`. Reads and writes
//! hold the guard for their whole critical section, including the copy to or
//! from the caller. A caller blocked on the guard can be cancelled through its
//! [`Signal`] and then gets `DeviceError::Interrupted` with nothing changed.

use std::fmt;

use crate::assembler::CommandAssembler;
use crate::config::{ConfigError, DeviceConfig, TrailingBytes};
use crate::error::DeviceError;
use crate::file::File;
use crate::guard::{AccessGuard, Signal};
use crate::idgen::IdGen;
use crate::io::buffer::try_grow;
use crate::io::{BufferError, UserSink, UserSource};
use crate::ring::RingLog;

/// Shared state serialized by the device guard
pub struct DeviceState {
    assembler: CommandAssembler,
    ring: RingLog,
}

impl DeviceState {
    fn new(config: &DeviceConfig) -> Self {
        Self {
            assembler: CommandAssembler::new(config.delimiter),
            ring: RingLog::new(config.capacity),
        }
    }

    #[must_use]
    pub fn assembler(&self) -> &CommandAssembler {
        &self.assembler
    }

    #[must_use]
    pub fn ring(&self) -> &RingLog {
        &self.ring
    }

    /// Assemble `chunk` and store what it completes, returning bytes accepted
    fn feed(&mut self, chunk: &[u8], trailing: TrailingBytes) -> Result<usize, BufferError> {
        let mut accepted = 0;
        while accepted < chunk.len() {
            #[allow(clippy::indexing_slicing)]
            let rest = &chunk[accepted..];
            let appended = match self.assembler.append(rest) {
                Ok(appended) => appended,
                // Commands stored so far stay stored, report a short write
                Err(_) if accepted > 0 => break,
                Err(e) => return Err(e),
            };
            accepted += appended.accepted;

            let Some(command) = appended.command else {
                break;
            };
            // The evicted entry, if any, is released here
            drop(self.ring.ingest(command));

            if trailing == TrailingBytes::Discard {
                break;
            }
        }
        Ok(accepted)
    }

    fn release_all(&mut self) -> ReleaseReport {
        let pending_bytes = self.assembler.discard_pending();
        let (entries, entry_bytes) = self.ring.release_all();
        ReleaseReport {
            entries,
            entry_bytes,
            pending_bytes,
        }
    }
}

impl fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceState({:?}, {:?})", self.assembler, self.ring)
    }
}

/// What a teardown released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReleaseReport {
    /// Live entries released
    pub entries: usize,
    /// Bytes held by those entries
    pub entry_bytes: usize,
    /// Bytes of an unfinished command
    pub pending_bytes: usize,
}

impl ReleaseReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0 && self.pending_bytes == 0
    }
}

/// A command log device
pub struct CommandLog {
    state: AccessGuard<DeviceState>,
    config: DeviceConfig,
    ids: IdGen,
}

impl CommandLog {
    /// Initialize a device: empty ring, empty pending buffer, unlocked guard
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: DeviceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!("cmdlog: init {config:?}");
        Ok(Self {
            state: AccessGuard::new(DeviceState::new(&config)),
            config,
            ids: IdGen::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Open a file on the device
    pub fn open(&self) -> File<'_> {
        let handle = self.ids.next_handle();
        log::debug!("open {handle:?}");
        File::new(self, handle)
    }

    /// Release an opened file; the device state is untouched
    pub fn release(&self, file: File<'_>) {
        log::debug!("release {:?}", file.handle());
        drop(file);
    }

    /// Write caller bytes, returning how many were accepted
    ///
    /// See [`crate::assembler`] for why the count can be smaller than the
    /// caller buffer under `TrailingBytes::Discard`.
    ///
    /// # Errors
    /// - `InvalidArgument` if the caller buffer is missing
    /// - `OutOfMemory` if a buffer cannot grow (nothing is stored)
    /// - `TransferFault` if the caller buffer cannot be read (nothing is stored)
    /// - `Interrupted` if `signal` was raised while waiting for the guard
    pub fn write<S: UserSource + ?Sized>(
        &self,
        src: &S,
        signal: &Signal,
    ) -> Result<usize, DeviceError> {
        if src.is_null() {
            return Err(DeviceError::InvalidArgument);
        }
        let count = src.len();
        if count == 0 {
            return Ok(0);
        }
        log::debug!("write {count} bytes");

        let mut local = Vec::new();
        try_grow(&mut local, count)?;
        local.resize(count, 0);
        src.copy_into(&mut local)?;

        let mut state = self.state.lock_interruptible(signal)?;
        let accepted = state.feed(&local, self.config.trailing_bytes)?;
        log::trace!("write accepted {accepted} of {count} bytes: {:?}", *state);
        Ok(accepted)
    }

    /// Read up to `count` bytes of the logical stream at `*pos`
    ///
    /// A single read never crosses from one command into the next. Returns 0
    /// at the end of the stream. On success `*pos` advances by the bytes read.
    ///
    /// # Errors
    /// - `InvalidArgument` if the caller buffer is missing
    /// - `TransferFault` if the caller buffer cannot take the bytes
    /// - `Interrupted` if `signal` was raised while waiting for the guard
    pub fn read<D: UserSink + ?Sized>(
        &self,
        pos: &mut u64,
        dst: &mut D,
        count: usize,
        signal: &Signal,
    ) -> Result<usize, DeviceError> {
        if dst.is_null() {
            return Err(DeviceError::InvalidArgument);
        }
        log::debug!("read {count} bytes with offset {pos}");

        let state = self.state.lock_interruptible(signal)?;
        let Some((entry, within)) = state.ring.resolve(*pos) else {
            return Ok(0);
        };
        let n = count.min(entry.len() - within);
        // `within < entry.len()` by `resolve`, and `n` fits in the remainder
        #[allow(clippy::indexing_slicing)]
        let bytes = &entry[within..within + n];
        dst.copy_from(bytes)?;
        *pos += n as u64;
        Ok(n)
    }

    /// Length of the logical stream
    ///
    /// # Errors
    /// Returns `Interrupted` if `signal` was raised while waiting for the guard.
    pub fn logical_len(&self, signal: &Signal) -> Result<u64, DeviceError> {
        Ok(self
            .state
            .with_exclusive_access(signal, |state| state.ring.total_len())?)
    }

    /// Copies of the live commands, oldest first
    ///
    /// # Errors
    /// Returns `Interrupted` if `signal` was raised while waiting for the guard.
    pub fn live_commands(&self, signal: &Signal) -> Result<Vec<Vec<u8>>, DeviceError> {
        Ok(self.state.with_exclusive_access(signal, |state| {
            state.ring.iter().map(|e| e.as_bytes().to_vec()).collect()
        })?)
    }

    /// Bytes waiting for a delimiter
    ///
    /// # Errors
    /// Returns `Interrupted` if `signal` was raised while waiting for the guard.
    pub fn pending_len(&self, signal: &Signal) -> Result<usize, DeviceError> {
        Ok(self
            .state
            .with_exclusive_access(signal, |state| state.assembler.pending_len())?)
    }

    /// Stream offset of byte `within` of the `index`-th live command
    ///
    /// # Errors
    /// Returns `Interrupted` if `signal` was raised while waiting for the guard.
    pub fn command_offset(
        &self,
        index: usize,
        within: usize,
        signal: &Signal,
    ) -> Result<Option<u64>, DeviceError> {
        Ok(self
            .state
            .with_exclusive_access(signal, |state| state.ring.start_offset_of(index, within))?)
    }

    /// Tear the device down, releasing the pending bytes and every entry
    pub fn shutdown(self) -> ReleaseReport {
        self.release_all()
    }

    fn release_all(&self) -> ReleaseReport {
        let report = self.state.lock().release_all();
        if !report.is_empty() {
            log::debug!(
                "cmdlog: released {} entries ({} bytes) and {} pending bytes",
                report.entries,
                report.entry_bytes,
                report.pending_bytes
            );
        }
        report
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        let config = DeviceConfig::default();
        Self {
            state: AccessGuard::new(DeviceState::new(&config)),
            config,
            ids: IdGen::new(),
        }
    }
}

impl fmt::Debug for CommandLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandLog(config={:?}, {:?})", self.config, self.state)
    }
}

impl Drop for CommandLog {
    fn drop(&mut self) {
        self.release_all();
    }
}
