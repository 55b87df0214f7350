//! Errors surfaced at the device boundary

use core::ffi::c_int;
use std::fmt;

use crate::guard::Interrupted;
use crate::io::{BufferError, TransferFault};

pub const EFAULT: c_int = 14;
pub const ENOMEM: c_int = 12;
/// Kernel-internal "restart the system call" code
pub const ERESTARTSYS: c_int = 512;

/// Error returned by the device entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// Missing caller buffer or an impossible position
    InvalidArgument,
    /// A buffer could not grow
    OutOfMemory,
    /// Copying from or to the caller failed
    TransferFault,
    /// Waiting for the device lock was cancelled; retry the whole call
    Interrupted,
}

impl DeviceError {
    /// Positive errno for the kernel-style `-errno` return convention
    ///
    /// A missing caller buffer is a bad address, as `read(2)` reports it.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn errno(&self) -> c_int {
        match self {
            Self::InvalidArgument => EFAULT,
            Self::OutOfMemory => ENOMEM,
            Self::TransferFault => EFAULT,
            Self::Interrupted => ERESTARTSYS,
        }
    }

    /// Whether the caller should simply retry the call
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::TransferFault => write!(f, "bad address in caller buffer"),
            Self::Interrupted => write!(f, "interrupted, restart the call"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<BufferError> for DeviceError {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::OutOfMemory { .. } => Self::OutOfMemory,
        }
    }
}

impl From<TransferFault> for DeviceError {
    fn from(_: TransferFault) -> Self {
        Self::TransferFault
    }
}

impl From<Interrupted> for DeviceError {
    fn from(_: Interrupted) -> Self {
        Self::Interrupted
    }
}

impl embedded_io::Error for DeviceError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::InvalidArgument => embedded_io::ErrorKind::InvalidInput,
            Self::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
            Self::TransferFault => embedded_io::ErrorKind::Other,
            Self::Interrupted => embedded_io::ErrorKind::Interrupted,
        }
    }
}
