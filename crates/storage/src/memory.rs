//! In-memory series store
//!
//! `MemoryStore` keeps each series' points in memory behind a
//! `parking_lot::RwLock`. A read snapshots the matching series (`Arc`
//! clones), so writers never block an in-flight stream and cursors never
//! borrow the store.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use tsread_core::{BatchCursor, Cursor, ReadRequest, Result, ResultSet, Store, Tag, TimestampRange};

use crate::result_set::{select, SeriesResultSet, SeriesSource};
use crate::series::{PointBudget, SeriesPoints, Values};

/// Default number of points per cursor batch
pub const DEFAULT_BATCH_LEN: usize = 1000;

#[derive(Debug)]
struct MemorySeries {
    key: Vec<u8>,
    tags: Vec<Tag>,
    points: SeriesPoints,
}

/// Series store held entirely in memory
#[derive(Debug)]
pub struct MemoryStore {
    series: RwLock<BTreeMap<Vec<u8>, Arc<MemorySeries>>>,
    batch_len: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_batch_len(DEFAULT_BATCH_LEN)
    }

    /// Create an empty store whose cursors yield at most `batch_len` points
    /// per batch
    pub fn with_batch_len(batch_len: usize) -> Self {
        Self {
            series: RwLock::new(BTreeMap::new()),
            batch_len: batch_len.max(1),
        }
    }

    /// Insert or replace a series. Tags are sorted by key.
    pub fn insert(&self, key: impl Into<Vec<u8>>, mut tags: Vec<Tag>, points: SeriesPoints) {
        let key = key.into();
        tags.sort();
        let series = Arc::new(MemorySeries {
            key: key.clone(),
            tags,
            points,
        });
        self.series.write().insert(key, series);
    }

    /// Remove a series; returns whether it existed
    pub fn remove(&self, key: &[u8]) -> bool {
        self.series.write().remove(key).is_some()
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.series.read().len()
    }

    /// True when no series are stored
    pub fn is_empty(&self) -> bool {
        self.series.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn read(&self, req: &ReadRequest) -> Result<Option<Box<dyn ResultSet + '_>>> {
        let candidates: Vec<MemoryEntry> = self
            .series
            .read()
            .values()
            .map(|series| MemoryEntry {
                series: Arc::clone(series),
                batch_len: self.batch_len,
            })
            .collect();
        let selected = select(candidates, req);
        if selected.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(SeriesResultSet::new(selected, req))))
    }
}

struct MemoryEntry {
    series: Arc<MemorySeries>,
    batch_len: usize,
}

impl SeriesSource for MemoryEntry {
    fn key(&self) -> &[u8] {
        &self.series.key
    }

    fn tags(&self) -> &[Tag] {
        &self.series.tags
    }

    fn open_cursor(
        &self,
        range: TimestampRange,
        descending: bool,
        budget: &PointBudget,
    ) -> Option<Cursor> {
        let span = self.series.points.index_range(range);
        if span.is_empty() {
            return None;
        }
        let series = Arc::clone(&self.series);
        let budget = budget.clone();
        let batch_len = self.batch_len;
        let cursor = match self.series.points.values() {
            Values::Integer(_) => Cursor::Integer(Box::new(MemoryCursor::new(
                series, span, descending, batch_len, budget, integers,
            ))),
            Values::Float(_) => Cursor::Float(Box::new(MemoryCursor::new(
                series, span, descending, batch_len, budget, floats,
            ))),
            Values::Unsigned(_) => Cursor::Unsigned(Box::new(MemoryCursor::new(
                series, span, descending, batch_len, budget, unsigneds,
            ))),
            Values::Boolean(_) => Cursor::Boolean(Box::new(MemoryCursor::new(
                series, span, descending, batch_len, budget, booleans,
            ))),
            Values::String(_) => Cursor::String(Box::new(MemoryCursor::new(
                series, span, descending, batch_len, budget, strings,
            ))),
        };
        Some(cursor)
    }
}

fn integers(v: &Values) -> &[i64] {
    match v {
        Values::Integer(x) => x,
        _ => &[],
    }
}

fn floats(v: &Values) -> &[f64] {
    match v {
        Values::Float(x) => x,
        _ => &[],
    }
}

fn unsigneds(v: &Values) -> &[u64] {
    match v {
        Values::Unsigned(x) => x,
        _ => &[],
    }
}

fn booleans(v: &Values) -> &[bool] {
    match v {
        Values::Boolean(x) => x,
        _ => &[],
    }
}

fn strings(v: &Values) -> &[String] {
    match v {
        Values::String(x) => x,
        _ => &[],
    }
}

struct MemoryCursor<T> {
    series: Option<Arc<MemorySeries>>,
    /// Unread index range
    lo: usize,
    hi: usize,
    descending: bool,
    batch_len: usize,
    budget: PointBudget,
    column: fn(&Values) -> &[T],
    ts: Vec<i64>,
    vs: Vec<T>,
}

impl<T: Clone> MemoryCursor<T> {
    fn new(
        series: Arc<MemorySeries>,
        span: std::ops::Range<usize>,
        descending: bool,
        batch_len: usize,
        budget: PointBudget,
        column: fn(&Values) -> &[T],
    ) -> Self {
        Self {
            series: Some(series),
            lo: span.start,
            hi: span.end,
            descending,
            batch_len,
            budget,
            column,
            ts: Vec::new(),
            vs: Vec::new(),
        }
    }
}

impl<T: Clone> BatchCursor<T> for MemoryCursor<T> {
    fn next_batch(&mut self) -> (&[i64], &[T]) {
        self.ts.clear();
        self.vs.clear();
        let Some(series) = self.series.clone() else {
            return (&self.ts, &self.vs);
        };

        let n = self.budget.take((self.hi - self.lo).min(self.batch_len));
        if n == 0 {
            self.lo = self.hi;
            return (&self.ts, &self.vs);
        }

        let timestamps = series.points.timestamps();
        let values = (self.column)(series.points.values());
        if self.descending {
            let span = self.hi - n..self.hi;
            self.hi -= n;
            self.ts.extend(timestamps[span.clone()].iter().rev());
            self.vs.extend(values[span].iter().rev().cloned());
        } else {
            let span = self.lo..self.lo + n;
            self.lo += n;
            self.ts.extend_from_slice(&timestamps[span.clone()]);
            self.vs.extend_from_slice(&values[span]);
        }
        (&self.ts, &self.vs)
    }

    fn close(&mut self) {
        self.series = None;
        self.lo = self.hi;
        self.ts = Vec::new();
        self.vs = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<T: Clone>(c: &mut dyn BatchCursor<T>) -> (Vec<i64>, Vec<T>, usize) {
        let (mut ts, mut vs, mut batches) = (Vec::new(), Vec::new(), 0);
        loop {
            let (t, v) = c.next_batch();
            if t.is_empty() {
                break;
            }
            assert_eq!(t.len(), v.len());
            ts.extend_from_slice(t);
            vs.extend_from_slice(v);
            batches += 1;
        }
        (ts, vs, batches)
    }

    fn store() -> MemoryStore {
        let s = MemoryStore::with_batch_len(2);
        s.insert(
            "cpu,host=b",
            vec![Tag::new("host", "b")],
            SeriesPoints::new(vec![1, 2, 3, 4, 5], Values::Integer(vec![10, 20, 30, 40, 50])).unwrap(),
        );
        s.insert(
            "cpu,host=a",
            vec![Tag::new("host", "a")],
            SeriesPoints::new(vec![2, 4], Values::Float(vec![0.2, 0.4])).unwrap(),
        );
        s.insert(
            "cpu,host=c",
            vec![Tag::new("host", "c")],
            SeriesPoints::new(vec![100], Values::Boolean(vec![true])).unwrap(),
        );
        s
    }

    fn keys(rs: &mut dyn ResultSet) -> Vec<String> {
        let mut out = Vec::new();
        while rs.next() {
            out.push(String::from_utf8(rs.series_key().to_vec()).unwrap());
        }
        out
    }

    #[test]
    fn test_series_in_key_order() {
        let s = store();
        let mut rs = s.read(&ReadRequest::default().normalized()).unwrap().unwrap();
        assert_eq!(keys(rs.as_mut()), vec!["cpu,host=a", "cpu,host=b", "cpu,host=c"]);
    }

    #[test]
    fn test_descending_reverses_series_and_points() {
        let s = store();
        let req = ReadRequest {
            descending: true,
            ..Default::default()
        }
        .normalized();
        let mut rs = s.read(&req).unwrap().unwrap();
        assert!(rs.next());
        assert_eq!(rs.series_key(), b"cpu,host=c");
        assert!(rs.next());
        assert_eq!(rs.series_key(), b"cpu,host=b");
        match rs.cursor() {
            Some(Cursor::Integer(mut c)) => {
                let (ts, vs, batches) = drain(c.as_mut());
                assert_eq!(ts, vec![5, 4, 3, 2, 1]);
                assert_eq!(vs, vec![50, 40, 30, 20, 10]);
                assert_eq!(batches, 3);
            }
            other => panic!("unexpected cursor {:?}", other),
        }
    }

    #[test]
    fn test_offset_and_limit() {
        let s = store();
        let req = ReadRequest {
            series_offset: 1,
            series_limit: 1,
            ..Default::default()
        };
        let mut rs = s.read(&req).unwrap().unwrap();
        assert_eq!(keys(rs.as_mut()), vec!["cpu,host=b"]);

        let past_end = ReadRequest {
            series_offset: 3,
            ..Default::default()
        };
        assert!(s.read(&past_end).unwrap().is_none());
    }

    #[test]
    fn test_time_range_and_missing_data() {
        let s = store();
        let req = ReadRequest {
            timestamp_range: TimestampRange::new(3, 50),
            ..Default::default()
        };
        let mut rs = s.read(&req).unwrap().unwrap();

        assert!(rs.next());
        let Some(Cursor::Float(mut c)) = rs.cursor() else {
            panic!("expected float cursor");
        };
        assert_eq!(drain(c.as_mut()).0, vec![4]);

        assert!(rs.next());
        let Some(Cursor::Integer(mut c)) = rs.cursor() else {
            panic!("expected integer cursor");
        };
        assert_eq!(drain(c.as_mut()).0, vec![3, 4, 5]);

        assert!(rs.next());
        assert!(rs.cursor().is_none());
        assert!(!rs.next());
    }

    #[test]
    fn test_points_limit_shared_across_cursors() {
        let s = store();
        let req = ReadRequest {
            points_limit: 3,
            ..Default::default()
        };
        let mut rs = s.read(&req).unwrap().unwrap();
        let mut total = 0;
        while rs.next() {
            match rs.cursor() {
                Some(Cursor::Integer(mut c)) => total += drain(c.as_mut()).0.len(),
                Some(Cursor::Float(mut c)) => total += drain(c.as_mut()).0.len(),
                Some(_) => panic!("limit should stop before the boolean series"),
                None => {}
            }
        }
        assert_eq!(total, 3);
    }

    #[test]
    fn test_close_is_idempotent() {
        let s = store();
        let mut rs = s.read(&ReadRequest::default()).unwrap().unwrap();
        assert!(rs.next());
        let mut c = rs.cursor().unwrap();
        c.close();
        c.close();
        rs.close();
        rs.close();
        assert!(!rs.next());
        assert!(rs.series_key().is_empty());
    }

    #[test]
    fn test_empty_store_reads_none() {
        assert!(MemoryStore::new().read(&ReadRequest::default()).unwrap().is_none());
    }
}
