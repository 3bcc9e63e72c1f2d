//! Merging runs into the next level.
//!
//! Leveled cascade: when a level holds `run_threshold` runs, the oldest
//! `run_threshold` of them are merged into a single run appended to the next
//! level, which may in turn reach its threshold.
//!
//! Crash ordering: the merged file is written under a temp name, fsync'd and
//! renamed before any input file is deleted. A crash in between leaves
//! duplicate data on disk (the inputs and their merge), never missing data.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::bloom::builder::BloomFilterBuilder;
use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::iterator::merge::MergeIterator;
use crate::level::{Level, Run};
use crate::sstable::builder::{SSTableBuilder, discard_partial};
use crate::sstable::reader::SSTable;

/// Merge `inputs` into one new SSTable at `path`.
///
/// `inputs` are ordered oldest first; for a key present in several of them,
/// the value from the last one wins. The output holds the union of the
/// inputs' keys, strictly ascending, and its filter is the OR of theirs.
///
/// Inputs are left untouched. On failure the partial output is removed.
pub fn merge_tables(path: &Path, inputs: &[Arc<SSTable>], filter_bits: usize) -> Result<SSTable> {
    let result = (|| {
        let filter = BloomFilterBuilder::merged(filter_bits, inputs.iter().map(|t| t.filter()))?;
        let iters = inputs
            .iter()
            .map(|t| t.iter().map(|it| Box::new(it) as Box<dyn StorageIterator>))
            .collect::<Result<Vec<_>>>()?;
        let mut merged = MergeIterator::new(iters)?;

        let mut builder = SSTableBuilder::new(path, filter)?;
        while merged.is_valid() {
            builder.add(merged.key(), merged.value())?;
            merged.next()?;
        }
        builder.finish()
    })();
    if result.is_err() {
        discard_partial(path);
    }
    result
}

/// A level whose oldest runs are due to be merged into the next level.
#[derive(Debug)]
pub struct CompactionTask {
    pub level: usize,
    pub inputs: Vec<Run>,
}

impl CompactionTask {
    /// Check `level` against the threshold. `None` if the level doesn't
    /// exist or holds fewer than `threshold` runs.
    pub fn pick(levels: &[Level], level: usize, threshold: usize) -> Option<Self> {
        let runs = levels.get(level)?;
        if runs.len() < threshold {
            return None;
        }
        Some(CompactionTask {
            level,
            inputs: runs.oldest(threshold).to_vec(),
        })
    }

    /// Level the merged run lands on.
    pub fn target_level(&self) -> usize {
        self.level + 1
    }

    /// Write the merged run to `path`.
    pub fn run(&self, path: &Path, filter_bits: usize) -> Result<SSTable> {
        info!(
            "compacting {} runs from L{} into {}",
            self.inputs.len(),
            self.level,
            path.display()
        );
        let tables: Vec<Arc<SSTable>> = self.inputs.iter().map(|r| r.table.clone()).collect();
        merge_tables(path, &tables, filter_bits)
    }

    /// Delete the input files. Only call once the merged run is durable.
    ///
    /// A failed delete is logged and skipped: the merged run already holds
    /// the same data, so a leftover input only costs space.
    pub fn remove_inputs(&self) {
        for input in &self.inputs {
            if let Err(e) = input.table.remove_file() {
                warn!("failed to delete compacted run {}: {e}", input.table.path().display());
            }
        }
    }
}
