//! Stored series points and the shared point budget

use std::cell::Cell;
use std::rc::Rc;

use tsread_core::{Error, Result, TimestampRange, ValueKind};

/// Typed value column of one series
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// Signed integers
    Integer(Vec<i64>),
    /// Floats
    Float(Vec<f64>),
    /// Unsigned integers
    Unsigned(Vec<u64>),
    /// Booleans
    Boolean(Vec<bool>),
    /// Strings
    String(Vec<String>),
}

impl Values {
    /// Number of values
    pub fn len(&self) -> usize {
        match self {
            Values::Integer(v) => v.len(),
            Values::Float(v) => v.len(),
            Values::Unsigned(v) => v.len(),
            Values::Boolean(v) => v.len(),
            Values::String(v) => v.len(),
        }
    }

    /// True when no values are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value kind of the column
    pub fn kind(&self) -> ValueKind {
        match self {
            Values::Integer(_) => ValueKind::Integer,
            Values::Float(_) => ValueKind::Float,
            Values::Unsigned(_) => ValueKind::Unsigned,
            Values::Boolean(_) => ValueKind::Boolean,
            Values::String(_) => ValueKind::String,
        }
    }
}

/// Time-ordered points of one series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoints {
    timestamps: Vec<i64>,
    values: Values,
}

impl SeriesPoints {
    /// Build a column pair.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the lengths differ or timestamps are not strictly
    /// ascending.
    pub fn new(timestamps: Vec<i64>, values: Values) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(Error::Storage(format!(
                "{} timestamps but {} values",
                timestamps.len(),
                values.len()
            )));
        }
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Storage(
                "timestamps must be strictly ascending".to_string(),
            ));
        }
        Ok(Self { timestamps, values })
    }

    /// Timestamps, ascending
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Values, parallel to `timestamps`
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// True when no points are held
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Index range of the points inside `range`
    pub fn index_range(&self, range: TimestampRange) -> std::ops::Range<usize> {
        index_range_by(self.timestamps.len(), |i| self.timestamps[i], range)
    }
}

/// Index range `lo..hi` of sorted timestamps (read through `ts_at`) in `range`
pub(crate) fn index_range_by(
    len: usize,
    ts_at: impl Fn(usize) -> i64,
    range: TimestampRange,
) -> std::ops::Range<usize> {
    let lower = partition_point(len, |i| ts_at(i) < range.start);
    let upper = partition_point(len, |i| ts_at(i) <= range.end);
    lower..upper.max(lower)
}

fn partition_point(len: usize, pred: impl Fn(usize) -> bool) -> usize {
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Points still allowed by a request's `points_limit`.
///
/// Shared by every cursor of one result set; the cursors of a single read
/// run sequentially so a plain `Cell` suffices.
#[derive(Debug, Clone)]
pub struct PointBudget(Rc<Cell<u64>>);

impl PointBudget {
    /// Budget of `limit` points; `u64::MAX` is effectively unbounded
    pub fn new(limit: u64) -> Self {
        Self(Rc::new(Cell::new(limit)))
    }

    /// Points left
    pub fn remaining(&self) -> u64 {
        self.0.get()
    }

    /// True once no points are left
    pub fn is_exhausted(&self) -> bool {
        self.0.get() == 0
    }

    /// Claim up to `wanted` points; returns how many were granted
    pub fn take(&self, wanted: usize) -> usize {
        let left = self.0.get();
        let granted = (wanted as u64).min(left);
        self.0.set(left - granted);
        granted as usize
    }
}
