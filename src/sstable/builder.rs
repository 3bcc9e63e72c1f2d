use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::bloom::builder::BloomFilterBuilder;
use crate::error::{Error, Result};
use crate::filename;
use crate::memtable::ImmutableMemTable;
use crate::sstable::reader::SSTable;
use crate::sstable::record;
use crate::types::Key;

/// Builds an SSTable file from a sorted stream of key-value pairs.
///
/// Used during:
/// - Memtable flush (sorted memtable → SSTable)
/// - Compaction (merged iterators → new SSTable)
///
/// Build process:
/// 1. Add entries one by one (strictly ascending keys)
/// 2. Each entry is encoded as a delimited record and buffered to the file
/// 3. finish() appends the filter blob, flushes, fsyncs, renames the file to
///    its final name and reopens it as a readable [`SSTable`]
///
/// Until `finish` renames it, the file lives at `<path>.tmp`. A crash
/// mid-write leaves only a temp file, which recovery deletes; a run name on
/// disk always refers to a complete table.
pub struct SSTableBuilder {
    /// Buffered file writer.
    writer: BufWriter<File>,
    /// Final name of the table.
    path: PathBuf,
    /// Where the file is written until `finish`.
    temp_path: PathBuf,
    /// Filter that ends up in the file's tail.
    filter: BloomFilterBuilder,
    /// Bytes of record data written so far; becomes `stop_pos`.
    data_offset: u64,
    /// Total entries added.
    entry_count: u64,
    /// Last key added, to enforce ordering.
    last_key: Option<Key>,
    /// Reused encoding buffer.
    scratch: Vec<u8>,
}

impl SSTableBuilder {
    /// Create a new SSTable builder for a table named `path`.
    pub fn new(path: &Path, filter: BloomFilterBuilder) -> Result<Self> {
        let temp_path = filename::temp_path(path);
        let file = File::create(&temp_path)?;
        Ok(SSTableBuilder {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            temp_path,
            filter,
            data_offset: 0,
            entry_count: 0,
            last_key: None,
            scratch: Vec::new(),
        })
    }

    /// Add a key-value pair. Keys MUST arrive in strictly ascending order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if let Some(last) = &self.last_key {
            if key <= last.as_slice() {
                return Err(Error::InvalidArgument(format!(
                    "keys must be strictly ascending: {:?} after {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last)
                )));
            }
        }

        self.scratch.clear();
        record::encode_record(key, value, &mut self.scratch);
        self.writer.write_all(&self.scratch)?;

        self.filter.add_key(key);
        self.data_offset += self.scratch.len() as u64;
        self.entry_count += 1;
        self.last_key = Some(key.to_vec());
        Ok(())
    }

    /// Number of entries added so far.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Finalize the SSTable: append the filter blob, flush, fsync, rename,
    /// reopen. The caller syncs the directory to make the rename durable.
    pub fn finish(mut self) -> Result<SSTable> {
        let filter = self.filter.build();
        self.writer.write_all(filter.serialized_bytes())?;

        // Flush buffer + fsync to guarantee durability
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        drop(self.writer);
        fs::rename(&self.temp_path, &self.path)?;

        debug!(
            "wrote sstable {} ({} entries, {} data bytes)",
            self.path.display(),
            self.entry_count,
            self.data_offset
        );
        SSTable::from_parts(&self.path, filter, self.data_offset)
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write a frozen memtable out as a new SSTable at `path`.
///
/// Entries are sorted here, and the filter is sized for exactly this many
/// keys. On failure the partial file is removed.
pub fn build_from_memtable(
    path: &Path,
    memtable: &ImmutableMemTable,
    filter_bits: usize,
) -> Result<SSTable> {
    let result = (|| {
        let filter = BloomFilterBuilder::new(filter_bits, memtable.len());
        let mut builder = SSTableBuilder::new(path, filter)?;
        for (key, value) in memtable.sorted_entries() {
            builder.add(key, value)?;
        }
        builder.finish()
    })();
    if result.is_err() {
        discard_partial(path);
    }
    result
}

/// Best-effort removal of a table whose write didn't complete, under
/// either its temp or its final name.
pub(crate) fn discard_partial(path: &Path) {
    for candidate in [filename::temp_path(path), path.to_path_buf()] {
        if let Err(e) = fs::remove_file(&candidate) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove partial sstable {}: {e}", candidate.display());
            }
        }
    }
}
