//! Storage layer for tsread
//!
//! This crate implements the storage side of a read:
//! - MemoryMap: owned mmap/munmap/madvise handle for files and scratch memory
//! - SegmentReader / SegmentStore: series data served from mapped files
//! - MemoryStore: series data held in memory
//!
//! Both stores return series in key order, honor series offset/limit and the
//! request's time range and direction, and share one point budget per read.

#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(not(unix))]
compile_error!("tsread-storage maps files through the POSIX mmap interface");

pub mod memory;
pub mod mmap;
pub mod segment;
pub mod series;

mod result_set;

pub use memory::{MemoryStore, DEFAULT_BATCH_LEN};
pub use mmap::{page_size, Advice, MemoryMap};
pub use segment::{write_segment, SegmentReader, SegmentStore};
pub use series::{PointBudget, SeriesPoints, Values};
