//! Read service: one streamed response per read request
//!
//! A read call runs synchronously on the caller's thread:
//!
//! 1. normalize the request and log it
//! 2. fetch a result set from the store
//! 3. stream it through the frame encoder into the caller's sink
//!
//! Store failures are returned to the caller before anything is sent. A
//! send failure ends the call quietly: the stream is cleaned up and the
//! returned stats are marked aborted.

use tracing::{debug, error, info};
use tsread_core::{Error, FrameLimits, ReadRequest, Result, Store};
use tsread_wire::ReadResponse;

use crate::config::ReadConfig;
use crate::encoder::{FrameEncoder, StreamStats};
use crate::sink::ResponseSink;

/// Serves streamed reads from a store
#[derive(Debug)]
pub struct ReadService<S> {
    store: S,
    encoder: FrameEncoder,
}

impl<S: Store> ReadService<S> {
    /// Service with the default limits (5000 points per frame, 50 frames
    /// per message)
    pub fn new(store: S) -> Self {
        Self {
            store,
            encoder: FrameEncoder::default(),
        }
    }

    /// Service with explicit framing limits
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the limits are unusable.
    pub fn with_limits(store: S, limits: FrameLimits) -> Result<Self> {
        Ok(Self {
            store,
            encoder: FrameEncoder::new(limits)?,
        })
    }

    /// Service configured from a `ReadConfig`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configured limits are unusable.
    pub fn with_config(store: S, config: &ReadConfig) -> Result<Self> {
        Self::with_limits(store, config.limits()?)
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Framing limits in force
    pub fn limits(&self) -> FrameLimits {
        self.encoder.limits()
    }

    /// Serve one read request into `sink`.
    ///
    /// A request matching nothing sends exactly one empty response. A
    /// request whose series all lack data sends nothing.
    ///
    /// # Errors
    ///
    /// Returns `Fetch` if the store cannot produce a result set; nothing has
    /// been sent in that case. Send failures are not errors: the stream is
    /// closed and the returned stats have `aborted` set.
    pub fn read<K: ResponseSink + ?Sized>(
        &self,
        mut req: ReadRequest,
        sink: &mut K,
    ) -> Result<StreamStats> {
        req.normalize();

        info!(
            target: "tsread::read",
            predicate = %req.predicate_string(),
            series_limit = req.series_limit,
            series_offset = req.series_offset,
            points_limit = req.points_limit,
            start = req.timestamp_range.start,
            end = req.timestamp_range.end,
            desc = req.descending,
            "read request"
        );

        let rs = match self.store.read(&req) {
            Ok(rs) => rs,
            Err(e) => {
                error!(target: "tsread::read", error = %e, "read request fetch failed");
                return Err(Error::fetch(e));
            }
        };

        let Some(mut rs) = rs else {
            return Ok(send_empty(sink));
        };

        let stats = self.encoder.encode(rs.as_mut(), sink);
        rs.close();

        debug!(
            target: "tsread::read",
            messages = stats.messages_sent,
            frames = stats.frames_sent,
            series = stats.series_emitted,
            points = stats.points_emitted,
            aborted = stats.aborted,
            "read complete"
        );
        Ok(stats)
    }
}

/// Reply to a request that matched nothing
fn send_empty<K: ResponseSink + ?Sized>(sink: &mut K) -> StreamStats {
    match sink.send(ReadResponse::default()) {
        Ok(()) => StreamStats {
            messages_sent: 1,
            ..StreamStats::default()
        },
        Err(e) => {
            error!(target: "tsread::read", error = %e, "stream send failed");
            StreamStats {
                aborted: true,
                ..StreamStats::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsread_core::ResultSet;

    struct Failing;

    impl Store for Failing {
        fn read(&self, _req: &ReadRequest) -> Result<Option<Box<dyn ResultSet + '_>>> {
            Err(Error::Storage("shard offline".to_string()))
        }
    }

    struct Nothing;

    impl Store for Nothing {
        fn read(&self, _req: &ReadRequest) -> Result<Option<Box<dyn ResultSet + '_>>> {
            Ok(None)
        }
    }

    #[test]
    fn test_fetch_error_sends_nothing() {
        let svc = ReadService::new(Failing);
        let mut out: Vec<ReadResponse> = Vec::new();
        let err = svc.read(ReadRequest::default(), &mut out).unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert!(err.to_string().contains("shard offline"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_no_result_set_sends_one_empty_response() {
        let svc = ReadService::new(Nothing);
        let mut out: Vec<ReadResponse> = Vec::new();
        let stats = svc.read(ReadRequest::default(), &mut out).unwrap();
        assert_eq!(out, vec![ReadResponse::default()]);
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.frames_sent, 0);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let limits = FrameLimits {
            batch_size: 10,
            frame_count: 1,
        };
        assert!(ReadService::with_limits(Nothing, limits).is_err());
    }
}
