use std::path::PathBuf;

use crate::error::{Error, Result};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding the run files. One engine per directory.
    pub dir: PathBuf,

    /// Entries the memtable absorbs before it is flushed to level 0.
    pub buffer_capacity: usize,

    /// Runs a level may hold before its oldest `run_threshold` runs are
    /// merged into the next level.
    pub run_threshold: usize,

    /// Bit count of every SSTable's membership filter. Files don't record
    /// it, so it must not change between openings of the same directory.
    pub filter_bits: usize,

    /// Write flushes (and the compactions they trigger) on a background
    /// thread instead of inside `put`.
    pub background_flush: bool,

    /// Create `dir` on open if it doesn't exist.
    pub create_if_missing: bool,
}

impl Options {
    /// Defaults, rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Options {
            dir: dir.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(Error::InvalidArgument("buffer_capacity must be at least 1".into()));
        }
        // A threshold of 1 would move every run up a level forever.
        if self.run_threshold < 2 {
            return Err(Error::InvalidArgument("run_threshold must be at least 2".into()));
        }
        if self.filter_bits == 0 {
            return Err(Error::InvalidArgument("filter_bits must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("lsmkv"),
            buffer_capacity: 16 * 1024,
            run_threshold: 3,
            filter_bits: 64 * 1024,
            background_flush: false,
            create_if_missing: true,
        }
    }
}
