//! Caller-side byte transfer
//!
//! The device never touches caller memory directly. It asks a [`UserSource`]
//! to copy bytes in, and a [`UserSink`] to copy bytes out. Either copy may
//! fail, which the device reports as a transfer fault without changing state.
//!
//! Plain slices implement both traits and never fault unless the requested
//! range does not fit. [`NullBuffer`] stands for a missing caller buffer.

use std::fmt;

/// The copy primitive failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferFault;

impl fmt::Display for TransferFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad address in caller buffer")
    }
}

impl std::error::Error for TransferFault {}

/// Caller memory that the device copies from on write
pub trait UserSource {
    /// Number of bytes the caller offers
    fn len(&self) -> usize;

    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the caller passed no buffer at all
    fn is_null(&self) -> bool {
        false
    }

    /// Copy the first `dst.len()` bytes of the caller buffer into `dst`
    ///
    /// # Errors
    /// Returns `TransferFault` if the caller memory cannot be read.
    fn copy_into(&self, dst: &mut [u8]) -> Result<(), TransferFault>;
}

/// Caller memory that the device copies into on read
pub trait UserSink {
    /// Number of bytes the caller can receive
    fn len(&self) -> usize;

    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the caller passed no buffer at all
    fn is_null(&self) -> bool {
        false
    }

    /// Copy `src` to the start of the caller buffer
    ///
    /// # Errors
    /// Returns `TransferFault` if the caller memory cannot be written.
    fn copy_from(&mut self, src: &[u8]) -> Result<(), TransferFault>;
}

impl UserSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), TransferFault> {
        let src = self.get(..dst.len()).ok_or(TransferFault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl UserSource for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), TransferFault> {
        self.as_slice().copy_into(dst)
    }
}

impl<const N: usize> UserSource for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_into(&self, dst: &mut [u8]) -> Result<(), TransferFault> {
        self.as_slice().copy_into(dst)
    }
}

impl UserSink for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_from(&mut self, src: &[u8]) -> Result<(), TransferFault> {
        let dst = self.get_mut(..src.len()).ok_or(TransferFault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl<const N: usize> UserSink for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_from(&mut self, src: &[u8]) -> Result<(), TransferFault> {
        self.as_mut_slice().copy_from(src)
    }
}

/// A missing caller buffer
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBuffer;

impl UserSource for NullBuffer {
    fn len(&self) -> usize {
        0
    }

    fn is_null(&self) -> bool {
        true
    }

    fn copy_into(&self, _dst: &mut [u8]) -> Result<(), TransferFault> {
        Err(TransferFault)
    }
}

impl UserSink for NullBuffer {
    fn len(&self) -> usize {
        0
    }

    fn is_null(&self) -> bool {
        true
    }

    fn copy_from(&mut self, _src: &[u8]) -> Result<(), TransferFault> {
        Err(TransferFault)
    }
}
