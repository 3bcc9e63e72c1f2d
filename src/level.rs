use std::sync::Arc;

use crate::error::Result;
use crate::sstable::reader::SSTable;
use crate::types::{RunId, Value};

/// One sorted run: an SSTable and the name it was given.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: RunId,
    pub table: Arc<SSTable>,
}

impl Run {
    pub fn new(id: RunId, table: SSTable) -> Self {
        Run {
            id,
            table: Arc::new(table),
        }
    }
}

/// A tier of runs, ordered by creation: the front is the oldest run, the
/// back the newest.
///
/// Levels are values inside an engine snapshot. They are cloned (cheaply,
/// the tables are shared) and replaced wholesale, never edited in place
/// while readers may hold them.
#[derive(Debug, Clone, Default)]
pub struct Level {
    runs: Vec<Run>,
}

impl Level {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a freshly created run; it becomes the newest.
    pub fn push(&mut self, run: Run) {
        self.runs.push(run);
    }

    /// The `n` oldest runs.
    pub fn oldest(&self, n: usize) -> &[Run] {
        &self.runs[..n.min(self.runs.len())]
    }

    /// Drop the `n` oldest runs.
    pub fn remove_oldest(&mut self, n: usize) {
        let n = n.min(self.runs.len());
        self.runs.drain(..n);
    }

    /// Look a key up in every run, newest first.
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        for run in self.runs.iter().rev() {
            if let Some(value) = run.table.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
