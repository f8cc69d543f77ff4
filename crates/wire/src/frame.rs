//! Response frames
//!
//! `Frame` is a tagged union; every consumer matches on it exhaustively so a
//! new frame type cannot be silently ignored at a serialization boundary.

use serde::{Deserialize, Serialize};
use tsread_core::Tag;

/// Start of a series' data within the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesFrame {
    /// Series key (measurement plus tag set, opaque bytes)
    pub name: Vec<u8>,
    /// Tag set, ordered by key
    pub tags: Vec<Tag>,
}

/// Batch of signed integer points
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerPointsFrame {
    /// Point timestamps, same length as `values`
    pub timestamps: Vec<i64>,
    /// Point values
    pub values: Vec<i64>,
}

/// Batch of floating-point points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatPointsFrame {
    /// Point timestamps, same length as `values`
    pub timestamps: Vec<i64>,
    /// Point values
    pub values: Vec<f64>,
}

/// Discriminator of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// [`Frame::Series`]
    Series,
    /// [`Frame::IntegerPoints`]
    IntegerPoints,
    /// [`Frame::FloatPoints`]
    FloatPoints,
}

/// One unit of a response message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// Series header
    Series(SeriesFrame),
    /// Integer points of the current series
    IntegerPoints(IntegerPointsFrame),
    /// Float points of the current series
    FloatPoints(FloatPointsFrame),
}

impl Frame {
    /// Discriminator of this frame
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Series(_) => FrameKind::Series,
            Frame::IntegerPoints(_) => FrameKind::IntegerPoints,
            Frame::FloatPoints(_) => FrameKind::FloatPoints,
        }
    }

    /// Number of points carried; zero for series frames
    pub fn point_count(&self) -> usize {
        match self {
            Frame::Series(_) => 0,
            Frame::IntegerPoints(p) => p.timestamps.len(),
            Frame::FloatPoints(p) => p.timestamps.len(),
        }
    }

    /// True for points frames
    pub fn is_points(&self) -> bool {
        !matches!(self, Frame::Series(_))
    }

    /// True when timestamps and values have the same length
    pub fn is_consistent(&self) -> bool {
        match self {
            Frame::Series(_) => true,
            Frame::IntegerPoints(p) => p.timestamps.len() == p.values.len(),
            Frame::FloatPoints(p) => p.timestamps.len() == p.values.len(),
        }
    }
}

impl From<SeriesFrame> for Frame {
    fn from(f: SeriesFrame) -> Self {
        Frame::Series(f)
    }
}

impl From<IntegerPointsFrame> for Frame {
    fn from(f: IntegerPointsFrame) -> Self {
        Frame::IntegerPoints(f)
    }
}

impl From<FloatPointsFrame> for Frame {
    fn from(f: FloatPointsFrame) -> Self {
        Frame::FloatPoints(f)
    }
}

/// One wire message of a streamed read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    /// Frames in emission order
    pub frames: Vec<Frame>,
}

impl ReadResponse {
    /// Empty response with room for `capacity` frames
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
        }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no frames are held
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total points across all points frames
    pub fn point_count(&self) -> usize {
        self.frames.iter().map(Frame::point_count).sum()
    }

    /// Number of series frames
    pub fn series_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.kind() == FrameKind::Series)
            .count()
    }
}
