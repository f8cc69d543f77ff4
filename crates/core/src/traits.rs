//! Core traits for the storage side of a read
//!
//! This module defines the `Store` and `ResultSet` traits that the read
//! service consumes. Implementations live in `tsread-storage` (or outside
//! this workspace entirely).

use crate::cursor::Cursor;
use crate::error::Result;
use crate::types::{ReadRequest, Tag};

/// Ordered collection of (series, cursor) pairs matching one request.
///
/// Series are produced in ascending series-key order, or descending when the
/// request asked for it. Once `next` has returned `false` no further series
/// are available.
pub trait ResultSet {
    /// Advance to the next series; `false` once exhausted
    fn next(&mut self) -> bool;

    /// Cursor for the current series.
    ///
    /// `None` means no data exists for this series and field; the caller
    /// skips the series.
    fn cursor(&mut self) -> Option<Cursor>;

    /// Key of the current series
    fn series_key(&self) -> &[u8];

    /// Tag set of the current series, ordered by key
    fn tags(&self) -> &[Tag];

    /// Release every resource held by the result set and its cursors.
    ///
    /// Must tolerate being called more than once.
    fn close(&mut self);
}

/// Storage abstraction queried by the read service
///
/// Thread safety: implementations are shared between concurrent read calls
/// and must be `Send + Sync`.
pub trait Store: Send + Sync {
    /// Resolve a request into a result set.
    ///
    /// Returns `Ok(None)` when no series match at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage layer cannot serve the request.
    fn read(&self, req: &ReadRequest) -> Result<Option<Box<dyn ResultSet + '_>>>;
}

impl<S: Store + ?Sized> Store for &S {
    fn read(&self, req: &ReadRequest) -> Result<Option<Box<dyn ResultSet + '_>>> {
        (**self).read(req)
    }
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn read(&self, req: &ReadRequest) -> Result<Option<Box<dyn ResultSet + '_>>> {
        (**self).read(req)
    }
}
