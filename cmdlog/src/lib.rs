pub mod assembler;
pub mod config;
pub mod device;
pub mod error;
pub mod file;
pub mod guard;
pub mod idgen;
pub mod io;
pub mod ring;

// Re-export device types for convenience
pub use device::{CommandLog, DeviceState, ReleaseReport};
pub use file::File;

// Re-export component types for convenience
pub use assembler::{Appended, CommandAssembler};
pub use guard::{AccessGuard, ExclusiveAccess, Interrupted, Signal};
pub use ring::{RingLog, DEFAULT_CAPACITY};

// Re-export I/O types for convenience
pub use io::{BufferError, Entry, NullBuffer, PendingBuffer, TransferFault, UserSink, UserSource};

// Re-export config and error types
pub use config::{ConfigError, DeviceConfig, TrailingBytes};
pub use error::DeviceError;
pub use idgen::{Handle, IdGen};
