/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// Identifies one sorted run on disk: the level it lives on and its run number
/// within that level.
///
/// Run numbers are allocated monotonically per level and never reused, so they
/// order runs by creation time independently of what a merge produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId {
    pub level: usize,
    pub run: u64,
}

impl RunId {
    pub fn new(level: usize, run: u64) -> Self {
        RunId { level, run }
    }
}
