//! Fixed-capacity ring log of completed commands
//!
//! The log is an arena of `capacity` slots indexed modulo `capacity`.
//! `write_index` is the next slot to fill and `full` says whether every slot
//! is live. Fullness is tracked explicitly because `write_index` alone
//! cannot tell an empty log from a full one.
//!
//! # Logical stream
//!
//! Live entries, oldest first, form one byte stream. Readers address it by
//! global offset; [`RingLog::resolve`] maps an offset to the entry holding
//! that byte and the offset inside it.
//!
//! ```text
//!   slots:   [ e3 | e4 | e0 | e1 | e2 ]      full, write_index = 2
//!                      ^ oldest
//!   stream:  e0 e1 e2 e3 e4
//! ```

use crate::io::Entry;

/// Default number of commands retained
pub const DEFAULT_CAPACITY: usize = 10;

pub struct RingLog {
    slots: Box<[Option<Entry>]>,
    write_index: usize,
    full: bool,
}

impl RingLog {
    /// Creates an empty log with a fixed `capacity`.
    ///
    /// # Panics
    /// Panics if `capacity == 0`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingLog capacity must be > 0");
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            write_index: 0,
            full: false,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else {
            self.write_index
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.full && self.write_index == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Slot holding the oldest live entry
    fn oldest_index(&self) -> usize {
        if self.full {
            self.write_index
        } else {
            0
        }
    }

    /// Store a completed command
    ///
    /// When the log is full, the oldest entry is evicted and returned so the
    /// caller decides when its bytes are released.
    pub fn ingest(&mut self, entry: Entry) -> Option<Entry> {
        debug_assert!(!entry.is_empty(), "entries are never empty");
        let capacity = self.capacity();
        let evicted = self
            .slots
            .get_mut(self.write_index)
            .and_then(|slot| slot.replace(entry));
        debug_assert_eq!(evicted.is_some(), self.full);

        self.write_index = (self.write_index + 1) % capacity;
        if self.write_index == 0 {
            self.full = true;
        }

        if let Some(old) = &evicted {
            log::debug!("ring: evicted oldest entry ({} bytes)", old.len());
        }
        evicted
    }

    /// Live entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        let start = self.oldest_index();
        let capacity = self.capacity();
        (0..self.len()).filter_map(move |i| {
            self.slots
                .get((start + i) % capacity)
                .and_then(Option::as_ref)
        })
    }

    /// Length of the logical stream
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.iter().map(|e| e.len() as u64).sum()
    }

    /// Map a global stream offset to `(entry, offset within entry)`
    ///
    /// Returns `None` when `offset` is at or past the end of the stream.
    #[must_use]
    pub fn resolve(&self, offset: u64) -> Option<(&Entry, usize)> {
        let mut before = 0u64;
        for entry in self.iter() {
            let after = before + entry.len() as u64;
            if after > offset {
                let within = usize::try_from(offset - before).ok()?;
                return Some((entry, within));
            }
            before = after;
        }
        None
    }

    /// Global offset of byte `within` of the `index`-th live entry (oldest = 0)
    ///
    /// Returns `None` if there is no such entry or `within` is past its end.
    #[must_use]
    pub fn start_offset_of(&self, index: usize, within: usize) -> Option<u64> {
        let mut before = 0u64;
        for (i, entry) in self.iter().enumerate() {
            if i == index {
                return (within < entry.len()).then_some(before + within as u64);
            }
            before += entry.len() as u64;
        }
        None
    }

    /// Release every live entry, returning `(entries, bytes)` released
    pub fn release_all(&mut self) -> (usize, usize) {
        let mut entries = 0;
        let mut bytes = 0;
        for slot in self.slots.iter_mut() {
            if let Some(entry) = slot.take() {
                entries += 1;
                bytes += entry.len();
            }
        }
        self.write_index = 0;
        self.full = false;
        (entries, bytes)
    }
}

impl std::fmt::Debug for RingLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RingLog(capacity={}, len={}, write_index={}, full={}, bytes={})",
            self.capacity(),
            self.len(),
            self.write_index,
            self.full,
            self.total_len()
        )
    }
}
