//! Typed batch cursors
//!
//! A cursor is bound to one (series, field) pair and yields that pair's
//! points as parallel `(timestamps, values)` batches. An empty batch means
//! the cursor is exhausted. Cursors are lazy, finite and not restartable.
//!
//! The value kind is carried by the [`Cursor`] enum so the frame encoder
//! dispatches exactly once per series instead of downcasting.

use std::fmt;

/// Batch producer for one value type.
pub trait BatchCursor<T> {
    /// Pull the next batch.
    ///
    /// Both slices have the same length. An empty batch signals exhaustion;
    /// every later call must also return an empty batch.
    fn next_batch(&mut self) -> (&[i64], &[T]);

    /// Release resources held by the cursor.
    ///
    /// Must tolerate being called more than once.
    fn close(&mut self);
}

/// Discriminator of a cursor's value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `i64` values
    Integer,
    /// `f64` values
    Float,
    /// `u64` values
    Unsigned,
    /// `bool` values
    Boolean,
    /// `String` values
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Unsigned => "unsigned",
            ValueKind::Boolean => "boolean",
            ValueKind::String => "string",
        };
        f.write_str(s)
    }
}

/// A cursor of any supported value kind
pub enum Cursor {
    /// Signed integer points
    Integer(Box<dyn BatchCursor<i64>>),
    /// Floating-point points
    Float(Box<dyn BatchCursor<f64>>),
    /// Unsigned integer points
    Unsigned(Box<dyn BatchCursor<u64>>),
    /// Boolean points
    Boolean(Box<dyn BatchCursor<bool>>),
    /// String points
    String(Box<dyn BatchCursor<String>>),
}

impl Cursor {
    /// The value kind this cursor yields
    pub fn kind(&self) -> ValueKind {
        match self {
            Cursor::Integer(_) => ValueKind::Integer,
            Cursor::Float(_) => ValueKind::Float,
            Cursor::Unsigned(_) => ValueKind::Unsigned,
            Cursor::Boolean(_) => ValueKind::Boolean,
            Cursor::String(_) => ValueKind::String,
        }
    }

    /// Close the underlying cursor
    pub fn close(&mut self) {
        match self {
            Cursor::Integer(c) => c.close(),
            Cursor::Float(c) => c.close(),
            Cursor::Unsigned(c) => c.close(),
            Cursor::Boolean(c) => c.close(),
            Cursor::String(c) => c.close(),
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.kind()).finish()
    }
}

/// Cursor over batches already held in memory.
///
/// Each pushed batch is returned as-is by one `next_batch` call.
#[derive(Debug, Clone)]
pub struct VecBatchCursor<T> {
    batches: Vec<(Vec<i64>, Vec<T>)>,
    pos: usize,
    closed: bool,
}

impl<T> VecBatchCursor<T> {
    /// Create a cursor from pre-built batches.
    ///
    /// Empty batches are dropped so they cannot end the sequence early.
    pub fn new(batches: Vec<(Vec<i64>, Vec<T>)>) -> Self {
        let batches = batches
            .into_iter()
            .filter(|(ts, vs)| {
                debug_assert_eq!(ts.len(), vs.len());
                !ts.is_empty()
            })
            .collect();
        Self {
            batches,
            pos: 0,
            closed: false,
        }
    }

    /// Split parallel vectors into batches of at most `batch_len` points
    pub fn chunked(timestamps: Vec<i64>, values: Vec<T>, batch_len: usize) -> Self
    where
        T: Clone,
    {
        let batch_len = batch_len.max(1);
        let batches = timestamps
            .chunks(batch_len)
            .zip(values.chunks(batch_len))
            .map(|(ts, vs)| (ts.to_vec(), vs.to_vec()))
            .collect();
        Self::new(batches)
    }

    /// True once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<T> BatchCursor<T> for VecBatchCursor<T> {
    fn next_batch(&mut self) -> (&[i64], &[T]) {
        if self.closed || self.pos >= self.batches.len() {
            return (&[], &[]);
        }
        let (ts, vs) = &self.batches[self.pos];
        self.pos += 1;
        (ts, vs)
    }

    fn close(&mut self) {
        self.closed = true;
        self.batches.clear();
    }
}
