//! Request and series types
//!
//! - `Tag`: one (key, value) pair of a series' tag set
//! - `TimestampRange`: inclusive nanosecond bounds of a read
//! - `ReadRequest`: everything a client asks of the read path

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::predicate::Predicate;

/// One (key, value) pair of a series' tag set.
///
/// Keys and values are raw bytes; they are not required to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key
    pub key: Vec<u8>,
    /// Tag value
    pub value: Vec<u8>,
}

impl Tag {
    /// Create a tag from anything byte-like
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}",
            String::from_utf8_lossy(&self.key),
            String::from_utf8_lossy(&self.value)
        )
    }
}

/// Inclusive time bounds in nanoseconds since the epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRange {
    /// First timestamp included
    pub start: i64,
    /// Last timestamp included
    pub end: i64,
}

impl TimestampRange {
    /// Create a range; `start > end` yields an empty range
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// The range covering every representable timestamp
    pub fn unbounded() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    /// Check whether `ts` lies within the bounds
    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts <= self.end
    }
}

impl Default for TimestampRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// A read request as received from a client.
///
/// `points_limit == 0` is the wire sentinel for "unbounded"; call
/// [`ReadRequest::normalize`] before handing the request to a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Filter expression, `None` matches everything
    pub predicate: Option<Predicate>,
    /// Maximum number of series returned, 0 = unlimited
    pub series_limit: u64,
    /// Number of matching series skipped before the first one returned
    pub series_offset: u64,
    /// Maximum number of points returned across all series, 0 = unlimited
    pub points_limit: u64,
    /// Time bounds of the read
    pub timestamp_range: TimestampRange,
    /// Iterate newest to oldest
    pub descending: bool,
}

impl ReadRequest {
    /// Replace the `points_limit` sentinel `0` with `u64::MAX`
    pub fn normalize(&mut self) {
        if self.points_limit == 0 {
            self.points_limit = u64::MAX;
        }
    }

    /// The request with `normalize` applied
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Diagnostic rendering of the predicate
    pub fn predicate_string(&self) -> String {
        match &self.predicate {
            Some(p) => p.to_string(),
            None => "[none]".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_zero_points_limit() {
        let mut req = ReadRequest::default();
        req.normalize();
        assert_eq!(req.points_limit, u64::MAX);
    }

    #[test]
    fn test_normalize_keeps_explicit_limit() {
        let req = ReadRequest {
            points_limit: 42,
            ..Default::default()
        }
        .normalized();
        assert_eq!(req.points_limit, 42);
    }

    #[test]
    fn test_predicate_string_none() {
        assert_eq!(ReadRequest::default().predicate_string(), "[none]");
    }

    #[test]
    fn test_timestamp_range_contains_is_inclusive() {
        let r = TimestampRange::new(10, 20);
        assert!(r.contains(10));
        assert!(r.contains(20));
        assert!(!r.contains(9));
        assert!(!r.contains(21));
        assert!(!TimestampRange::new(5, 4).contains(5));
    }

    #[test]
    fn test_tag_display_lossy() {
        let t = Tag::new("host", "a");
        assert_eq!(t.to_string(), "host=a");
    }

    proptest::proptest! {
        #[test]
        fn prop_normalize_never_leaves_zero(limit in proptest::num::u64::ANY) {
            let req = ReadRequest { points_limit: limit, ..Default::default() }.normalized();
            proptest::prop_assert!(req.points_limit != 0);
            if limit != 0 {
                proptest::prop_assert_eq!(req.points_limit, limit);
            }
        }
    }
}
