//! Result set shared by the bundled stores
//!
//! Both stores resolve a request to a list of series sources, then apply the
//! same ordering and pagination rules here.

use tracing::debug;
use tsread_core::{Cursor, ReadRequest, ResultSet, Tag, TimestampRange};

use crate::series::PointBudget;

/// One candidate series of a store
pub(crate) trait SeriesSource {
    fn key(&self) -> &[u8];

    fn tags(&self) -> &[Tag];

    /// Open a cursor over the points in `range`; `None` when there are none
    fn open_cursor(
        &self,
        range: TimestampRange,
        descending: bool,
        budget: &PointBudget,
    ) -> Option<Cursor>;
}

/// Order candidates by key (reversed for descending reads) and apply
/// `series_offset` / `series_limit`. A limit of 0 means unlimited.
pub(crate) fn select<S: SeriesSource>(mut candidates: Vec<S>, req: &ReadRequest) -> Vec<S> {
    candidates.sort_by(|a, b| a.key().cmp(b.key()));
    if req.descending {
        candidates.reverse();
    }
    let offset = usize::try_from(req.series_offset).unwrap_or(usize::MAX);
    let limit = match req.series_limit {
        0 => usize::MAX,
        n => usize::try_from(n).unwrap_or(usize::MAX),
    };
    candidates.into_iter().skip(offset).take(limit).collect()
}

/// Result set over selected series sources
pub(crate) struct SeriesResultSet<S> {
    series: Vec<S>,
    /// Index of the current series plus one; 0 before the first `next`
    pos: usize,
    range: TimestampRange,
    descending: bool,
    budget: PointBudget,
    closed: bool,
}

impl<S: SeriesSource> SeriesResultSet<S> {
    pub(crate) fn new(series: Vec<S>, req: &ReadRequest) -> Self {
        Self {
            series,
            pos: 0,
            range: req.timestamp_range,
            descending: req.descending,
            budget: PointBudget::new(match req.points_limit {
                0 => u64::MAX,
                n => n,
            }),
            closed: false,
        }
    }

    fn current(&self) -> Option<&S> {
        if self.closed || self.pos == 0 {
            return None;
        }
        self.series.get(self.pos - 1)
    }
}

impl<S: SeriesSource> ResultSet for SeriesResultSet<S> {
    fn next(&mut self) -> bool {
        if self.closed || self.pos >= self.series.len() {
            return false;
        }
        self.pos += 1;
        true
    }

    fn cursor(&mut self) -> Option<Cursor> {
        if self.budget.is_exhausted() {
            return None;
        }
        let series = self.current()?;
        series.open_cursor(self.range, self.descending, &self.budget)
    }

    fn series_key(&self) -> &[u8] {
        self.current().map(|s| s.key()).unwrap_or(&[])
    }

    fn tags(&self) -> &[Tag] {
        self.current().map(|s| s.tags()).unwrap_or(&[])
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        debug!(target: "tsread::storage", series = self.series.len(), "result set closed");
        self.closed = true;
        self.series.clear();
    }
}
