//! Read engine for tsread
//!
//! This crate serves streamed reads on top of a `Store`:
//! - ReadService: request logging, fetch, and streaming of one read call
//! - FrameEncoder: packs a result set into bounded response messages
//! - ResponseSink: the outbound stream (channels, writers, collectors)
//! - ReadConfig: framing limits loaded from `tsread.toml`
//!
//! The engine is the only component that knows about:
//! - Framing limits (points per frame, frames per message)
//! - Orphaned series rollback
//! - Send failure cleanup

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod encoder;
pub mod service;
pub mod sink;

pub use config::{ReadConfig, CONFIG_FILE_NAME};
pub use encoder::{FrameEncoder, StreamStats};
pub use service::ReadService;
pub use sink::{ResponseSink, WriterSink};
