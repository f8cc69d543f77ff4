//! Memory-mapped single-series segment files
//!
//! A segment holds the points of one series as two fixed-width columns, so
//! a cursor can binary-search and stream straight out of the page cache.
//!
//! ## File Format (Version 1)
//!
//! ```text
//! [magic "TSEG" 4B]
//! [version u32 LE]
//! [kind u8][pad 3B]
//! [count u64 LE]
//! [timestamps: count * i64 LE, strictly ascending]
//! [values: count * 8B LE (i64, f64 bits or u64 by kind)]
//! ```

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use tsread_core::{
    BatchCursor, Cursor, Error, ReadRequest, Result, ResultSet, Store, Tag, TimestampRange,
    ValueKind,
};

use crate::memory::DEFAULT_BATCH_LEN;
use crate::mmap::{Advice, MemoryMap};
use crate::result_set::{select, SeriesResultSet, SeriesSource};
use crate::series::{index_range_by, PointBudget, SeriesPoints, Values};

/// Magic bytes identifying a segment file
const MAGIC: &[u8; 4] = b"TSEG";
/// Current format version
const VERSION: u32 = 1;
/// Header size: magic(4) + version(4) + kind(1) + pad(3) + count(8)
const HEADER_SIZE: usize = 4 + 4 + 4 + 8;

const KIND_INTEGER: u8 = 0;
const KIND_FLOAT: u8 = 1;
const KIND_UNSIGNED: u8 = 2;

/// Write `points` to `path` atomically (temp file + rename).
///
/// Only integer, float and unsigned columns fit the fixed-width layout.
///
/// # Errors
///
/// Returns `Storage` for other value kinds, or `Io` on write failure.
pub fn write_segment(path: &Path, points: &SeriesPoints) -> Result<()> {
    let kind = match points.values() {
        Values::Integer(_) => KIND_INTEGER,
        Values::Float(_) => KIND_FLOAT,
        Values::Unsigned(_) => KIND_UNSIGNED,
        other => {
            return Err(Error::Storage(format!(
                "{} columns cannot be stored in a segment",
                other.kind()
            )))
        }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tseg.tmp");
    {
        let mut w = BufWriter::new(File::create(&temp_path)?);
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(VERSION)?;
        w.write_u8(kind)?;
        w.write_all(&[0u8; 3])?;
        w.write_u64::<LittleEndian>(points.len() as u64)?;
        for &ts in points.timestamps() {
            w.write_i64::<LittleEndian>(ts)?;
        }
        match points.values() {
            Values::Integer(vs) => {
                for &v in vs {
                    w.write_i64::<LittleEndian>(v)?;
                }
            }
            Values::Float(vs) => {
                for &v in vs {
                    w.write_f64::<LittleEndian>(v)?;
                }
            }
            Values::Unsigned(vs) => {
                for &v in vs {
                    w.write_u64::<LittleEndian>(v)?;
                }
            }
            Values::Boolean(_) | Values::String(_) => unreachable!("rejected above"),
        }
        let file = w.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Read-only, memory-mapped view of one segment file
#[derive(Debug)]
pub struct SegmentReader {
    map: MemoryMap,
    kind: ValueKind,
    count: usize,
}

impl SegmentReader {
    /// Map and validate a segment file.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` if the header or length is invalid, `Mapping` if
    /// the file cannot be mapped.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if file.metadata()?.len() < HEADER_SIZE as u64 {
            return Err(Error::Corruption(format!(
                "{}: segment too small for header",
                path.display()
            )));
        }
        let map = MemoryMap::open(&file)?;
        let data = map.as_slice();

        if &data[0..4] != MAGIC {
            return Err(Error::Corruption(format!("{}: invalid segment magic", path.display())));
        }
        let version = LittleEndian::read_u32(&data[4..8]);
        if version != VERSION {
            return Err(Error::Corruption(format!(
                "{}: unsupported segment version {}",
                path.display(),
                version
            )));
        }
        let kind = match data[8] {
            KIND_INTEGER => ValueKind::Integer,
            KIND_FLOAT => ValueKind::Float,
            KIND_UNSIGNED => ValueKind::Unsigned,
            other => {
                return Err(Error::Corruption(format!(
                    "{}: unknown value kind {}",
                    path.display(),
                    other
                )))
            }
        };
        let count = LittleEndian::read_u64(&data[12..20]);
        let expected = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(16))
            .and_then(|b| b.checked_add(HEADER_SIZE));
        if expected != Some(data.len()) {
            return Err(Error::Corruption(format!(
                "{}: {} bytes do not hold {} points",
                path.display(),
                data.len(),
                count
            )));
        }

        map.advise_or_log(Advice::Sequential);
        let count = count as usize;
        let timestamps = &data[HEADER_SIZE..HEADER_SIZE + count * 8];
        let mut prev: Option<i64> = None;
        for (i, chunk) in timestamps.chunks_exact(8).enumerate() {
            let ts = LittleEndian::read_i64(chunk);
            if prev.map_or(false, |p| p >= ts) {
                return Err(Error::Corruption(format!(
                    "{}: timestamp {} at point {} is not after its predecessor",
                    path.display(),
                    ts,
                    i
                )));
            }
            prev = Some(ts);
        }
        debug!(target: "tsread::segment", path = %path.display(), %kind, count, "segment mapped");
        Ok(Self {
            map,
            kind,
            count,
        })
    }

    /// Value kind of the segment
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when the segment holds no points
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Timestamp of point `i`, or `None` past the end
    pub fn timestamp(&self, i: usize) -> Option<i64> {
        (i < self.count).then(|| self.timestamp_at(i))
    }

    /// Timestamp of point `i`; `i` must be below `len()`
    fn timestamp_at(&self, i: usize) -> i64 {
        let at = HEADER_SIZE + i * 8;
        LittleEndian::read_i64(&self.map[at..at + 8])
    }

    fn value_bytes(&self, i: usize) -> &[u8] {
        let at = HEADER_SIZE + self.count * 8 + i * 8;
        &self.map[at..at + 8]
    }

    /// Index range of the points inside `range`
    pub fn index_range(&self, range: TimestampRange) -> std::ops::Range<usize> {
        index_range_by(self.count, |i| self.timestamp_at(i), range)
    }

    /// Open a cursor over the points in `range`.
    ///
    /// Returns `None` when no point falls inside the range.
    pub fn cursor(
        self: &Arc<Self>,
        range: TimestampRange,
        descending: bool,
        batch_len: usize,
        budget: PointBudget,
    ) -> Option<Cursor> {
        let span = self.index_range(range);
        if span.is_empty() {
            return None;
        }
        let reader = Arc::clone(self);
        let batch_len = batch_len.max(1);
        Some(match self.kind {
            ValueKind::Integer => Cursor::Integer(Box::new(SegmentCursor::new(
                reader, span, descending, batch_len, budget, LittleEndian::read_i64,
            ))),
            ValueKind::Float => Cursor::Float(Box::new(SegmentCursor::new(
                reader, span, descending, batch_len, budget, LittleEndian::read_f64,
            ))),
            ValueKind::Unsigned => Cursor::Unsigned(Box::new(SegmentCursor::new(
                reader, span, descending, batch_len, budget, LittleEndian::read_u64,
            ))),
            ValueKind::Boolean | ValueKind::String => return None,
        })
    }
}

struct SegmentCursor<T> {
    reader: Option<Arc<SegmentReader>>,
    lo: usize,
    hi: usize,
    descending: bool,
    batch_len: usize,
    budget: PointBudget,
    decode: fn(&[u8]) -> T,
    ts: Vec<i64>,
    vs: Vec<T>,
}

impl<T> SegmentCursor<T> {
    fn new(
        reader: Arc<SegmentReader>,
        span: std::ops::Range<usize>,
        descending: bool,
        batch_len: usize,
        budget: PointBudget,
        decode: fn(&[u8]) -> T,
    ) -> Self {
        Self {
            reader: Some(reader),
            lo: span.start,
            hi: span.end,
            descending,
            batch_len,
            budget,
            decode,
            ts: Vec::with_capacity(batch_len),
            vs: Vec::with_capacity(batch_len),
        }
    }
}

impl<T> BatchCursor<T> for SegmentCursor<T> {
    fn next_batch(&mut self) -> (&[i64], &[T]) {
        self.ts.clear();
        self.vs.clear();
        let Some(reader) = self.reader.as_ref() else {
            return (&self.ts, &self.vs);
        };

        let n = self.budget.take((self.hi - self.lo).min(self.batch_len));
        if n == 0 {
            self.lo = self.hi;
            return (&self.ts, &self.vs);
        }

        if self.descending {
            let span = self.hi - n..self.hi;
            self.hi -= n;
            for i in span.rev() {
                self.ts.push(reader.timestamp_at(i));
                self.vs.push((self.decode)(reader.value_bytes(i)));
            }
        } else {
            let span = self.lo..self.lo + n;
            self.lo += n;
            for i in span {
                self.ts.push(reader.timestamp_at(i));
                self.vs.push((self.decode)(reader.value_bytes(i)));
            }
        }
        (&self.ts, &self.vs)
    }

    fn close(&mut self) {
        self.reader = None;
        self.lo = self.hi;
    }
}

/// Store over a set of segment files, one per series
#[derive(Debug)]
pub struct SegmentStore {
    segments: RwLock<BTreeMap<Vec<u8>, SegmentEntry>>,
    batch_len: usize,
}

#[derive(Debug, Clone)]
struct SegmentEntry {
    key: Vec<u8>,
    tags: Vec<Tag>,
    path: PathBuf,
    reader: Arc<SegmentReader>,
    batch_len: usize,
}

impl Default for SegmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_batch_len(DEFAULT_BATCH_LEN)
    }

    /// Create an empty store whose cursors yield at most `batch_len` points
    /// per batch
    pub fn with_batch_len(batch_len: usize) -> Self {
        Self {
            segments: RwLock::new(BTreeMap::new()),
            batch_len: batch_len.max(1),
        }
    }

    /// Map the segment at `path` as the data of series `key`.
    ///
    /// Replaces any segment previously attached to the same key.
    pub fn attach(&self, key: impl Into<Vec<u8>>, mut tags: Vec<Tag>, path: &Path) -> Result<()> {
        let key = key.into();
        let reader = Arc::new(SegmentReader::open(path)?);
        tags.sort();
        info!(
            target: "tsread::segment",
            series = %String::from_utf8_lossy(&key),
            path = %path.display(),
            points = reader.len(),
            "segment attached"
        );
        let entry = SegmentEntry {
            key: key.clone(),
            tags,
            path: path.to_path_buf(),
            reader,
            batch_len: self.batch_len,
        };
        self.segments.write().insert(key, entry);
        Ok(())
    }

    /// Detach a series; its mapping is released once no reader holds it
    pub fn detach(&self, key: &[u8]) -> Option<PathBuf> {
        self.segments.write().remove(key).map(|e| e.path)
    }

    /// Number of attached series
    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    /// True when nothing is attached
    pub fn is_empty(&self) -> bool {
        self.segments.read().is_empty()
    }
}

impl Store for SegmentStore {
    fn read(&self, req: &ReadRequest) -> Result<Option<Box<dyn ResultSet + '_>>> {
        let candidates: Vec<SegmentEntry> = self.segments.read().values().cloned().collect();
        let selected = select(candidates, req);
        if selected.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(SeriesResultSet::new(selected, req))))
    }
}

impl SeriesSource for SegmentEntry {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn open_cursor(
        &self,
        range: TimestampRange,
        descending: bool,
        budget: &PointBudget,
    ) -> Option<Cursor> {
        self.reader
            .cursor(range, descending, self.batch_len, budget.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn drain_ints(c: &mut dyn BatchCursor<i64>) -> (Vec<i64>, Vec<i64>) {
        let (mut ts, mut vs) = (Vec::new(), Vec::new());
        loop {
            let (t, v) = c.next_batch();
            if t.is_empty() {
                return (ts, vs);
            }
            ts.extend_from_slice(t);
            vs.extend_from_slice(v);
        }
    }

    #[test]
    fn test_write_then_read_integer_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s.tseg");
        let ts: Vec<i64> = (0..100).map(|i| i * 10).collect();
        let vs: Vec<i64> = (0..100).map(|i| -i).collect();
        write_segment(&path, &SeriesPoints::new(ts.clone(), Values::Integer(vs.clone())).unwrap())
            .unwrap();

        let reader = Arc::new(SegmentReader::open(&path).unwrap());
        assert_eq!(reader.kind(), ValueKind::Integer);
        assert_eq!(reader.len(), 100);

        let Some(Cursor::Integer(mut c)) =
            reader.cursor(TimestampRange::unbounded(), false, 7, PointBudget::new(u64::MAX))
        else {
            panic!("expected integer cursor");
        };
        assert_eq!(drain_ints(c.as_mut()), (ts, vs));
    }

    #[test]
    fn test_range_and_descending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.tseg");
        write_segment(
            &path,
            &SeriesPoints::new(vec![1, 2, 3, 4], Values::Float(vec![1.5, 2.5, 3.5, 4.5])).unwrap(),
        )
        .unwrap();
        let reader = Arc::new(SegmentReader::open(&path).unwrap());
        let Some(Cursor::Float(mut c)) =
            reader.cursor(TimestampRange::new(2, 3), true, 1, PointBudget::new(u64::MAX))
        else {
            panic!("expected float cursor");
        };
        assert_eq!(c.next_batch(), (&[3i64][..], &[3.5f64][..]));
        assert_eq!(c.next_batch(), (&[2i64][..], &[2.5f64][..]));
        assert!(c.next_batch().0.is_empty());

        assert!(reader
            .cursor(TimestampRange::new(5, 9), false, 1, PointBudget::new(u64::MAX))
            .is_none());
    }

    #[test]
    fn test_rejects_boolean_column() {
        let dir = TempDir::new().unwrap();
        let points = SeriesPoints::new(vec![1], Values::Boolean(vec![true])).unwrap();
        assert!(matches!(
            write_segment(&dir.path().join("b.tseg"), &points),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let short = dir.path().join("short.tseg");
        fs::write(&short, b"TSEG").unwrap();
        assert!(matches!(SegmentReader::open(&short), Err(Error::Corruption(_))));

        let bad_magic = dir.path().join("magic.tseg");
        fs::write(&bad_magic, [0u8; HEADER_SIZE]).unwrap();
        assert!(matches!(SegmentReader::open(&bad_magic), Err(Error::Corruption(_))));

        let good = dir.path().join("good.tseg");
        write_segment(&good, &SeriesPoints::new(vec![1, 2], Values::Unsigned(vec![1, 2])).unwrap())
            .unwrap();
        let mut bytes = fs::read(&good).unwrap();
        bytes.truncate(bytes.len() - 8);
        let truncated = dir.path().join("truncated.tseg");
        fs::write(&truncated, &bytes).unwrap();
        assert!(matches!(SegmentReader::open(&truncated), Err(Error::Corruption(_))));

        // write_segment only accepts sorted points, so reorder on disk
        let sorted = dir.path().join("sorted.tseg");
        write_segment(
            &sorted,
            &SeriesPoints::new(vec![10, 20, 30], Values::Integer(vec![1, 2, 3])).unwrap(),
        )
        .unwrap();
        let bytes = fs::read(&sorted).unwrap();
        for (name, order) in [("reversed", [30i64, 20, 10]), ("duplicate", [10, 20, 20])] {
            let mut edited = bytes.clone();
            for (i, ts) in order.iter().enumerate() {
                let at = HEADER_SIZE + i * 8;
                LittleEndian::write_i64(&mut edited[at..at + 8], *ts);
            }
            let path = dir.path().join(format!("{}.tseg", name));
            fs::write(&path, &edited).unwrap();
            assert!(
                matches!(SegmentReader::open(&path), Err(Error::Corruption(_))),
                "{} timestamps accepted",
                name
            );
        }
    }

    #[test]
    fn test_timestamp_past_end_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.tseg");
        write_segment(&path, &SeriesPoints::new(vec![5, 9], Values::Float(vec![0.5, 0.9])).unwrap())
            .unwrap();
        let reader = SegmentReader::open(&path).unwrap();
        assert_eq!(reader.timestamp(1), Some(9));
        assert_eq!(reader.timestamp(2), None);
        assert_eq!(reader.timestamp(usize::MAX), None);
    }

    #[test]
    fn test_store_reads_attached_segments() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::with_batch_len(2);
        for (i, host) in ["b", "a"].iter().enumerate() {
            let path = dir.path().join(format!("{}.tseg", host));
            let base = i as i64 * 100;
            write_segment(
                &path,
                &SeriesPoints::new(vec![base, base + 1], Values::Integer(vec![1, 2])).unwrap(),
            )
            .unwrap();
            store
                .attach(format!("cpu,host={}", host), vec![Tag::new("host", *host)], &path)
                .unwrap();
        }
        assert_eq!(store.len(), 2);

        let mut rs = store.read(&ReadRequest::default()).unwrap().unwrap();
        assert!(rs.next());
        assert_eq!(rs.series_key(), b"cpu,host=a");
        assert_eq!(rs.tags(), &[Tag::new("host", "a")]);
        let Some(Cursor::Integer(mut c)) = rs.cursor() else {
            panic!("expected integer cursor");
        };
        assert_eq!(drain_ints(c.as_mut()).0, vec![100, 101]);
        c.close();
        c.close();
        assert!(rs.next());
        assert!(!rs.next());
        rs.close();
        rs.close();

        assert!(store.detach(b"cpu,host=a").is_some());
        assert_eq!(store.len(), 1);
    }
}
