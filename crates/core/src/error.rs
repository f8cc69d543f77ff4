//! Error types for the read path
//!
//! This module defines the single error type shared by every tsread crate.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for tsread operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the read path and the mapping layer
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, sockets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),

    /// The storage layer could not produce a result set for a request.
    ///
    /// Terminal for the read call; no response has been sent.
    #[error("Request fetch failed: {0}")]
    Fetch(#[source] Box<Error>),

    /// The outbound stream rejected a response message
    #[error("Stream send failed: {0}")]
    StreamSend(String),

    /// The OS refused to create a mapping
    #[error("Mapping failed: {0}")]
    Mapping(#[source] io::Error),

    /// The OS refused to release a mapping
    #[error("Unmap failed: {0}")]
    Unmap(#[source] io::Error),

    /// An access-pattern hint was rejected
    #[error("Advise failed: {0}")]
    Advise(#[source] io::Error),

    /// Wire encoding/decoding error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wrap a storage-layer failure as a fetch failure
    pub fn fetch(source: Error) -> Self {
        Error::Fetch(Box::new(source))
    }

    /// True for failures caused by the outbound stream
    pub fn is_send(&self) -> bool {
        matches!(self, Error::StreamSend(_))
    }
}
