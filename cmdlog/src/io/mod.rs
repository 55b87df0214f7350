//! I/O module for cmdlog
//!
//! Contains the owned byte buffers and the caller transfer primitive.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Caller memory                      │
//! │  - UserSource (write)               │
//! │  - UserSink (read)                  │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ copy_into / copy_from (may fault)
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  PendingBuffer                      │
//! │  - grows until the delimiter        │
//! │  - complete() moves bytes out       │
//! └─────────────────────────────────────┘
//!          │
//!          │ ownership moves exactly once
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Entry                              │
//! │  - immutable, non-empty             │
//! │  - owned by the ring log            │
//! │  - released on drop                 │
//! └─────────────────────────────────────┘
//! ```

pub mod buffer;
pub mod transfer;

pub use buffer::{BufferError, Entry, PendingBuffer};
pub use transfer::{NullBuffer, TransferFault, UserSink, UserSource};
