//! Core types and traits for tsread
//!
//! This crate defines the foundational types used throughout the read path:
//! - ReadRequest / TimestampRange / Tag: what a client asks for
//! - Predicate: filter expression carried by a request (rendering only)
//! - Cursor / BatchCursor: typed per-series point producers
//! - ResultSet / Store: the storage side of a read
//! - FrameLimits: batching bounds of streamed responses
//! - Error: error type shared by every crate

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod error;
pub mod limits;
pub mod predicate;
pub mod traits;
pub mod types;

pub use cursor::{BatchCursor, Cursor, ValueKind, VecBatchCursor};
pub use error::{Error, Result};
pub use limits::{FrameLimits, BATCH_SIZE, FRAME_COUNT};
pub use predicate::{Comparison, Logical, Node, Predicate};
pub use traits::{ResultSet, Store};
pub use types::{ReadRequest, Tag, TimestampRange};
