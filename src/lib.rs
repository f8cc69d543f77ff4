//! tsread - streamed read path for a time-series store
//!
//! tsread turns a read request into a stream of bounded response messages:
//! each message carries at most 50 frames, each points frame at most 5000
//! points, so a read of any size runs in constant memory.
//!
//! # Quick Start
//!
//! ```ignore
//! use tsread::{MemoryStore, ReadRequest, ReadResponse, ReadService, SeriesPoints, Tag, Values};
//!
//! let store = MemoryStore::new();
//! store.insert(
//!     "cpu,host=a",
//!     vec![Tag::new("host", "a")],
//!     SeriesPoints::new(vec![1, 2], Values::Float(vec![0.5, 0.7]))?,
//! );
//!
//! let service = ReadService::new(store);
//! let mut responses: Vec<ReadResponse> = Vec::new();
//! service.read(ReadRequest::default(), &mut responses)?;
//! ```
//!
//! # Architecture
//!
//! - `tsread-core`: request, cursor and result set types, the error type
//! - `tsread-wire`: frames, response messages and their length-prefixed codec
//! - `tsread-storage`: memory maps, mapped segment files, the bundled stores
//! - `tsread-engine`: the frame encoder, read service, sinks and config

pub use tsread_core::*;
pub use tsread_engine::{
    FrameEncoder, ReadConfig, ReadService, ResponseSink, StreamStats, WriterSink,
    CONFIG_FILE_NAME,
};
pub use tsread_storage::{
    page_size, write_segment, Advice, MemoryMap, MemoryStore, SegmentReader, SegmentStore,
    SeriesPoints, Values,
};
pub use tsread_wire::{
    decode_message, encode_message, read_message, write_message, FloatPointsFrame, Frame,
    FrameKind, IntegerPointsFrame, ReadResponse, SeriesFrame,
};
