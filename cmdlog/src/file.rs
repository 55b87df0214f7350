//! Opened files
//!
//! A [`File`] is what `open` hands out: a handle id, a stream position and a
//! cancellation signal. Reads use and advance the position; writes always
//! go to the assembler and leave the position alone.
//!
//! `File` implements `embedded_io::{Read, Write, Seek}`. Note that
//! `embedded_io::Read::read_exact` and friends work as expected only up to a
//! command boundary, because one read never spans two commands.

use embedded_io::SeekFrom;
use std::fmt;

use crate::device::CommandLog;
use crate::error::DeviceError;
use crate::guard::Signal;
use crate::idgen::Handle;

pub struct File<'a> {
    device: &'a CommandLog,
    handle: Handle,
    pos: u64,
    signal: Signal,
}

impl<'a> File<'a> {
    pub(crate) fn new(device: &'a CommandLog, handle: Handle) -> Self {
        Self {
            device,
            handle,
            pos: 0,
            signal: Signal::new(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The signal that interrupts this file's blocked calls
    ///
    /// Clone it to raise it from another thread.
    #[must_use]
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Current stream position
    #[must_use]
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Read at the current position, see [`CommandLog::read`]
    ///
    /// # Errors
    /// Returns the device error of the underlying read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let count = buf.len();
        self.device.read(&mut self.pos, buf, count, &self.signal)
    }

    /// Write to the device, see [`CommandLog::write`]
    ///
    /// # Errors
    /// Returns the device error of the underlying write.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, DeviceError> {
        self.device.write(buf, &self.signal)
    }

    /// Move the position
    ///
    /// `SeekFrom::End` is relative to the current length of the logical stream.
    /// Positions past the end are allowed and read as end of stream.
    ///
    /// # Errors
    /// - `InvalidArgument` if the new position would be negative
    /// - `Interrupted` if the stream length was needed and the wait was cancelled
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, DeviceError> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self
                .device
                .logical_len(&self.signal)?
                .checked_add_signed(delta),
        };
        self.pos = target.ok_or(DeviceError::InvalidArgument)?;
        log::trace!("{:?}: seek to {}", self.handle, self.pos);
        Ok(self.pos)
    }

    /// Position at byte `within` of the `index`-th live command (oldest = 0)
    ///
    /// # Errors
    /// - `InvalidArgument` if there is no such command or byte
    /// - `Interrupted` if the wait for the guard was cancelled
    pub fn seek_to_command(&mut self, index: usize, within: usize) -> Result<u64, DeviceError> {
        self.pos = self
            .device
            .command_offset(index, within, &self.signal)?
            .ok_or(DeviceError::InvalidArgument)?;
        Ok(self.pos)
    }
}

impl fmt::Debug for File<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File(handle={:?}, pos={}, {:?})",
            self.handle, self.pos, self.signal
        )
    }
}

impl embedded_io::ErrorType for File<'_> {
    type Error = DeviceError;
}

impl embedded_io::Read for File<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        File::read(self, buf)
    }
}

impl embedded_io::Write for File<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        File::write(self, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_io::Seek for File<'_> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        File::seek(self, pos)
    }
}
