//! Frame encoder: result set in, bounded response messages out
//!
//! The encoder walks a result set once, in order, and emits frames into an
//! accumulator that never holds more than `frame_count` frames:
//!
//! - a series with no cursor is skipped
//! - each series starts with a series frame, followed by points frames of at
//!   most `batch_size` points each
//! - a series whose cursor produced no points is rolled back, so its series
//!   frame is never sent
//! - a series frame is never the last frame of a message; when only one slot
//!   is left the message is sent first
//! - a full accumulator is sent and reset; a series may continue in the next
//!   message with points frames only
//!
//! A send failure is terminal: the open cursor and the result set are closed
//! and nothing else is sent.

use std::mem;

use tracing::{debug, error};
use tsread_core::{BatchCursor, Cursor, Error, FrameLimits, Result, ResultSet};
use tsread_wire::{FloatPointsFrame, Frame, IntegerPointsFrame, ReadResponse, SeriesFrame};

use crate::sink::ResponseSink;

/// What one streamed read produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Messages delivered to the sink
    pub messages_sent: u64,
    /// Frames delivered, series and points frames alike
    pub frames_sent: u64,
    /// Series that contributed at least one point
    pub series_emitted: u64,
    /// Points delivered
    pub points_emitted: u64,
    /// True when the stream stopped early because a send failed
    pub aborted: bool,
}

/// Turns a result set into a sequence of response messages
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    limits: FrameLimits,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self {
            limits: FrameLimits::default(),
        }
    }
}

impl FrameEncoder {
    /// Create an encoder with the given limits
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the limits are unusable.
    pub fn new(limits: FrameLimits) -> Result<Self> {
        limits.validate()?;
        Ok(Self { limits })
    }

    /// Limits in force
    pub fn limits(&self) -> FrameLimits {
        self.limits
    }

    /// Stream every series of `rs` into `sink`.
    ///
    /// Never sends an empty message; a result set that yields no points
    /// sends nothing. On a send failure the stream is abandoned and the
    /// returned stats have `aborted` set.
    pub fn encode<K: ResponseSink + ?Sized>(
        &self,
        rs: &mut dyn ResultSet,
        sink: &mut K,
    ) -> StreamStats {
        let mut out = Accumulator::new(self.limits, sink);

        while rs.next() {
            let Some(mut cursor) = rs.cursor() else {
                // no data for series key + field combination
                continue;
            };

            if out.remaining() < 2 {
                if let Err(e) = out.flush() {
                    cursor.close();
                    rs.close();
                    return out.abort(e);
                }
            }

            let series_frame_index = out.response.len();
            out.response.frames.push(Frame::Series(SeriesFrame {
                name: rs.series_key().to_vec(),
                tags: rs.tags().to_vec(),
            }));

            let kind = cursor.kind();
            let drained = match &mut cursor {
                Cursor::Integer(c) => out.drain(c.as_mut(), |timestamps, values| {
                    Frame::IntegerPoints(IntegerPointsFrame { timestamps, values })
                }),
                Cursor::Float(c) => out.drain(c.as_mut(), |timestamps, values| {
                    Frame::FloatPoints(FloatPointsFrame { timestamps, values })
                }),
                Cursor::Unsigned(_) | Cursor::Boolean(_) | Cursor::String(_) => {
                    debug!(target: "tsread::read", %kind, "no frame type for cursor kind");
                    Ok(0)
                }
            };
            cursor.close();

            match drained {
                Ok(0) => {
                    // no points collected, so strip series
                    debug_assert_eq!(out.response.len(), series_frame_index + 1);
                    out.response.frames.truncate(series_frame_index);
                }
                Ok(_) => out.stats.series_emitted += 1,
                Err(e) => {
                    rs.close();
                    return out.abort(e);
                }
            }
        }

        if let Err(e) = out.flush() {
            rs.close();
            return out.abort(e);
        }
        out.stats
    }
}

/// In-progress message plus the sink it drains into
struct Accumulator<'a, K: ?Sized> {
    limits: FrameLimits,
    sink: &'a mut K,
    response: ReadResponse,
    stats: StreamStats,
}

impl<'a, K: ResponseSink + ?Sized> Accumulator<'a, K> {
    fn new(limits: FrameLimits, sink: &'a mut K) -> Self {
        Self {
            limits,
            sink,
            response: ReadResponse::with_capacity(limits.frame_count),
            stats: StreamStats::default(),
        }
    }

    /// Free frame slots in the current message
    fn remaining(&self) -> usize {
        self.limits.frame_count.saturating_sub(self.response.len())
    }

    /// Pull every batch of `cursor` into points frames; returns the number
    /// of points collected
    fn drain<T: Clone>(
        &mut self,
        cursor: &mut dyn BatchCursor<T>,
        make: impl Fn(Vec<i64>, Vec<T>) -> Frame,
    ) -> Result<usize> {
        let batch_size = self.limits.batch_size;
        let mut timestamps: Vec<i64> = Vec::with_capacity(batch_size);
        let mut values: Vec<T> = Vec::with_capacity(batch_size);
        let mut total = 0;

        loop {
            let (ts, vs) = cursor.next_batch();
            if ts.is_empty() {
                break;
            }
            debug_assert_eq!(ts.len(), vs.len());
            let n = ts.len().min(vs.len());

            let mut at = 0;
            while at < n {
                let take = (batch_size - timestamps.len()).min(n - at);
                timestamps.extend_from_slice(&ts[at..at + take]);
                values.extend_from_slice(&vs[at..at + take]);
                at += take;
                total += take;

                if timestamps.len() == batch_size {
                    let frame = make(
                        mem::replace(&mut timestamps, Vec::with_capacity(batch_size)),
                        mem::replace(&mut values, Vec::with_capacity(batch_size)),
                    );
                    self.push_points(frame)?;
                }
            }
        }

        if !timestamps.is_empty() {
            self.push_points(make(timestamps, values))?;
        }
        Ok(total)
    }

    fn push_points(&mut self, frame: Frame) -> Result<()> {
        self.response.frames.push(frame);
        if self.response.len() >= self.limits.frame_count {
            self.flush()?;
        }
        Ok(())
    }

    /// Send the current message if it holds any frames
    fn flush(&mut self) -> Result<()> {
        if self.response.is_empty() {
            return Ok(());
        }
        let msg = mem::replace(
            &mut self.response,
            ReadResponse::with_capacity(self.limits.frame_count),
        );
        let frames = msg.len() as u64;
        let points = msg.point_count() as u64;
        self.sink.send(msg)?;
        self.stats.messages_sent += 1;
        self.stats.frames_sent += frames;
        self.stats.points_emitted += points;
        Ok(())
    }

    fn abort(mut self, e: Error) -> StreamStats {
        error!(
            target: "tsread::read",
            error = %e,
            messages_sent = self.stats.messages_sent,
            "stream send failed"
        );
        self.response.frames.clear();
        self.stats.aborted = true;
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsread_core::{Tag, VecBatchCursor};

    /// Result set over (key, cursor factory) pairs
    struct Fixture {
        series: Vec<(Vec<u8>, Option<Cursor>)>,
        pos: usize,
        closed: usize,
    }

    impl Fixture {
        fn new(series: Vec<(&str, Option<Cursor>)>) -> Self {
            Self {
                series: series
                    .into_iter()
                    .map(|(k, c)| (k.as_bytes().to_vec(), c))
                    .collect(),
                pos: 0,
                closed: 0,
            }
        }
    }

    impl ResultSet for Fixture {
        fn next(&mut self) -> bool {
            if self.pos >= self.series.len() {
                return false;
            }
            self.pos += 1;
            true
        }

        fn cursor(&mut self) -> Option<Cursor> {
            self.series[self.pos - 1].1.take()
        }

        fn series_key(&self) -> &[u8] {
            &self.series[self.pos - 1].0
        }

        fn tags(&self) -> &[Tag] {
            &[]
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }

    fn ints(batches: Vec<(Vec<i64>, Vec<i64>)>) -> Option<Cursor> {
        Some(Cursor::Integer(Box::new(VecBatchCursor::new(batches))))
    }

    #[test]
    fn test_single_series() {
        let mut rs = Fixture::new(vec![("s1", ints(vec![(vec![1, 2], vec![10, 20])]))]);
        let mut out = Vec::new();
        let stats = FrameEncoder::default().encode(&mut rs, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].frames,
            vec![
                Frame::Series(SeriesFrame {
                    name: b"s1".to_vec(),
                    tags: vec![]
                }),
                Frame::IntegerPoints(IntegerPointsFrame {
                    timestamps: vec![1, 2],
                    values: vec![10, 20]
                }),
            ]
        );
        assert_eq!(stats.series_emitted, 1);
        assert_eq!(stats.points_emitted, 2);
        assert!(!stats.aborted);
    }

    #[test]
    fn test_batch_split_across_frames() {
        let limits = FrameLimits::new(3, 50).unwrap();
        let ts: Vec<i64> = (0..8).collect();
        let mut rs = Fixture::new(vec![("s", ints(vec![(ts.clone(), ts.clone())]))]);
        let mut out = Vec::new();
        FrameEncoder::new(limits).unwrap().encode(&mut rs, &mut out);

        let sizes: Vec<usize> = out[0].frames.iter().map(Frame::point_count).collect();
        assert_eq!(sizes, vec![0, 3, 3, 2]);
    }

    #[test]
    fn test_float_batches_split_across_frames() {
        let limits = FrameLimits::new(3, 50).unwrap();
        let floats = Cursor::Float(Box::new(VecBatchCursor::new(vec![
            (vec![1, 2], vec![0.1, 0.2]),
            (vec![3, 4, 5, 6, 7], vec![0.3, 0.4, 0.5, 0.6, 0.7]),
        ])));
        let mut rs = Fixture::new(vec![("f", Some(floats))]);
        let mut out = Vec::new();
        let stats = FrameEncoder::new(limits).unwrap().encode(&mut rs, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].frames[1..],
            [
                Frame::FloatPoints(FloatPointsFrame {
                    timestamps: vec![1, 2, 3],
                    values: vec![0.1, 0.2, 0.3],
                }),
                Frame::FloatPoints(FloatPointsFrame {
                    timestamps: vec![4, 5, 6],
                    values: vec![0.4, 0.5, 0.6],
                }),
                Frame::FloatPoints(FloatPointsFrame {
                    timestamps: vec![7],
                    values: vec![0.7],
                }),
            ]
        );
        assert_eq!(stats.points_emitted, 7);
    }

    #[test]
    fn test_series_frame_never_ends_a_message() {
        // 3 frame slots: [S, P] fits, next series must start a new message
        let limits = FrameLimits::new(10, 3).unwrap();
        let mut rs = Fixture::new(vec![
            ("a", ints(vec![(vec![1], vec![1])])),
            ("b", ints(vec![(vec![1], vec![1])])),
        ]);
        let mut out = Vec::new();
        FrameEncoder::new(limits).unwrap().encode(&mut rs, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 2);
        assert_eq!(out[1].len(), 2);
    }

    #[test]
    fn test_empty_result_sends_nothing() {
        let mut rs = Fixture::new(vec![("a", None), ("b", ints(vec![]))]);
        let mut out = Vec::new();
        let stats = FrameEncoder::default().encode(&mut rs, &mut out);
        assert!(out.is_empty());
        assert_eq!(stats, StreamStats::default());
    }
}
