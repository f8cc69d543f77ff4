//! Framing limits for streamed responses
//!
//! These limits bound how much memory one read call holds and how large a
//! single wire message can grow, independent of how much data a query
//! matches. They are injected into the frame encoder at construction.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default maximum number of points in one points frame
pub const BATCH_SIZE: usize = 5000;

/// Default maximum number of frames in one response message
pub const FRAME_COUNT: usize = 50;

/// Per-frame and per-message bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLimits {
    /// Maximum points per points frame (default: 5000)
    pub batch_size: usize,

    /// Maximum frames per response message (default: 50)
    pub frame_count: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        FrameLimits {
            batch_size: BATCH_SIZE,
            frame_count: FRAME_COUNT,
        }
    }
}

impl FrameLimits {
    /// Create validated limits
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `batch_size` is zero or `frame_count` cannot
    /// hold a series frame followed by one points frame.
    pub fn new(batch_size: usize, frame_count: usize) -> Result<Self> {
        let limits = FrameLimits {
            batch_size,
            frame_count,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// Check the limits are usable
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.frame_count < 2 {
            return Err(Error::InvalidConfig(format!(
                "frame_count must be at least 2, got {}",
                self.frame_count
            )));
        }
        Ok(())
    }
}
