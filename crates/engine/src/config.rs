//! Read service configuration via `tsread.toml`
//!
//! The framing limits are fixed per service instance: they are read once
//! at construction and injected into the frame encoder. Clients cannot
//! change them per request.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tsread_core::{Error, FrameLimits, Result, BATCH_SIZE, FRAME_COUNT};
use tsread_storage::{MemoryStore, SegmentStore, DEFAULT_BATCH_LEN};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "tsread.toml";

/// Read path configuration loaded from `tsread.toml`.
///
/// # Example
///
/// ```toml
/// batch_size = 5000
/// frame_count = 50
/// cursor_batch_len = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Maximum points per points frame.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum frames per response message.
    #[serde(default = "default_frame_count")]
    pub frame_count: usize,
    /// Points per batch pulled from the bundled stores' cursors.
    #[serde(default = "default_cursor_batch_len")]
    pub cursor_batch_len: usize,
}

fn default_batch_size() -> usize {
    BATCH_SIZE
}

fn default_frame_count() -> usize {
    FRAME_COUNT
}

fn default_cursor_batch_len() -> usize {
    DEFAULT_BATCH_LEN
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            frame_count: default_frame_count(),
            cursor_batch_len: default_cursor_batch_len(),
        }
    }
}

impl ReadConfig {
    /// Validated framing limits
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `batch_size` or `frame_count` is unusable.
    pub fn limits(&self) -> Result<FrameLimits> {
        FrameLimits::new(self.batch_size, self.frame_count)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# tsread configuration
#
# Maximum points per points frame (default: 5000)
batch_size = 5000

# Maximum frames per response message (default: 50)
frame_count = 50

# Points per batch pulled from store cursors (default: 1000)
cursor_batch_len = 1000
"#
    }

    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the document does not parse or the limits
    /// are unusable.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ReadConfig = toml::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.limits()?;
        if config.cursor_batch_len == 0 {
            return Err(Error::InvalidConfig(
                "cursor_batch_len must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::InvalidConfig(msg) => {
                Error::InvalidConfig(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Empty in-memory store using this config's cursor batch length
    pub fn memory_store(&self) -> MemoryStore {
        MemoryStore::with_batch_len(self.cursor_batch_len)
    }

    /// Empty segment store using this config's cursor batch length
    pub fn segment_store(&self) -> SegmentStore {
        SegmentStore::with_batch_len(self.cursor_batch_len)
    }
}
