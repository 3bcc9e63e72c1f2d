use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;

use crate::bloom::BloomFilter;
use crate::error::{Error, Result};
use crate::sstable::iterator::SSTableIterator;
use crate::sstable::record::{self, KEY_DELIM};
use crate::types::{Key, Value};

/// Bytes read per disk access while scanning for delimiters.
pub const PROBE_CHUNK_SIZE: usize = 512;

/// An opened SSTable file. Supports point lookups and sequential scans.
///
/// On open:
/// 1. Stat the file; the last `ceil(S / 8)` bytes are the filter blob
/// 2. `stop_pos = file_size − blob size` marks the end of the records
/// 3. Read the blob into a [`BloomFilter`]
/// 4. Ready for queries (records are read on demand, never cached)
#[derive(Debug)]
pub struct SSTable {
    /// Path to the SSTable file.
    path: PathBuf,
    /// Open file handle for lookups. Reads are positional (`pread`), so
    /// concurrent lookups share it without a lock.
    file: File,
    /// Membership filter for this table's key set.
    filter: BloomFilter,
    /// Offset one past the last record byte.
    stop_pos: u64,
}

/// A record found by [`SSTable::probe`], along with where it sits.
#[derive(Debug)]
struct ProbedRecord {
    /// Offset of the record's `KEY_DELIM`.
    start: u64,
    /// Offset just past the record: the next record's start, or `stop_pos`.
    end: u64,
    key: Key,
    value: Value,
}

impl SSTable {
    /// Open an existing SSTable file written with a `filter_bits`-bit filter.
    pub fn open(path: &Path, filter_bits: usize) -> Result<Self> {
        let mut file = File::open(path)?;

        let file_size = file.metadata()?.len();
        let blob_size = BloomFilter::serialized_size_for(filter_bits) as u64;
        if file_size < blob_size {
            return Err(Error::Corruption(format!(
                "{}: {} bytes is too short for a {} byte filter",
                path.display(),
                file_size,
                blob_size
            )));
        }

        let stop_pos = file_size - blob_size;
        file.seek(SeekFrom::Start(stop_pos))?;
        let mut blob = vec![0u8; blob_size as usize];
        file.read_exact(&mut blob)?;
        let filter = BloomFilter::from_bytes(filter_bits, &blob)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            filter,
            stop_pos,
        })
    }

    /// Wrap a file that was just written, keeping the in-memory filter (and
    /// its exact hash count) instead of rereading the blob.
    pub(crate) fn from_parts(path: &Path, filter: BloomFilter, stop_pos: u64) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            filter,
            stop_pos,
        })
    }

    /// Point lookup: check if key exists and return its value.
    ///
    /// Algorithm:
    /// 1. Ask the filter; a "definitely absent" costs no disk access
    /// 2. Binary search the byte range `[0, stop_pos)`. Records are
    ///    variable-length with no offset index, so a probe at `mid` realigns
    ///    by scanning forward to the next `KEY_DELIM` and parsing that record
    /// 3. Narrow the range around the parsed record until it matches or the
    ///    range is empty
    ///
    /// The search keeps the invariant that, if the key is present, its
    /// record starts inside `[low, high)`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        if !self.filter.may_contain(key) {
            return Ok(None);
        }

        let mut low = 0u64;
        let mut high = self.stop_pos;

        while low < high {
            let mid = low + (high - low) / 2;
            let Some(found) = self.probe(mid, high)? else {
                // No record starts in [mid, high): the target is further left.
                high = mid;
                continue;
            };

            match found.key.as_slice().cmp(key) {
                Ordering::Less => low = found.end,
                Ordering::Equal => return Ok(Some(found.value)),
                Ordering::Greater => high = found.start,
            }
        }

        debug!("{}: filter false positive", self.path.display());
        Ok(None)
    }

    /// Find the first record starting in `[from, limit)` and parse it.
    ///
    /// Returns `None` if no record starts there, or if the bytes up to the
    /// next delimiter don't parse as a record. Both mean "look lower".
    fn probe(&self, from: u64, limit: u64) -> Result<Option<ProbedRecord>> {
        let mut chunk = [0u8; PROBE_CHUNK_SIZE];

        let mut pos = from;
        let start = loop {
            if pos >= limit {
                return Ok(None);
            }
            let want = PROBE_CHUNK_SIZE.min((limit - pos) as usize);
            let n = read_chunk(&self.file, pos, &mut chunk[..want])?;
            if n == 0 {
                return Ok(None);
            }
            if let Some(i) = chunk[..n].iter().position(|b| *b == KEY_DELIM) {
                break pos + i as u64;
            }
            pos += n as u64;
        };

        let mut body = Vec::new();
        let mut pos = start + 1;
        let end = loop {
            if pos >= self.stop_pos {
                break self.stop_pos;
            }
            let want = PROBE_CHUNK_SIZE.min((self.stop_pos - pos) as usize);
            let n = read_chunk(&self.file, pos, &mut chunk[..want])?;
            if n == 0 {
                break pos;
            }
            if let Some(i) = chunk[..n].iter().position(|b| *b == KEY_DELIM) {
                body.extend_from_slice(&chunk[..i]);
                break pos + i as u64;
            }
            body.extend_from_slice(&chunk[..n]);
            pos += n as u64;
        };

        Ok(record::decode_body(&body).map(|(key, value)| ProbedRecord {
            start,
            end,
            key,
            value,
        }))
    }

    /// Create a sequential iterator over all records, in key order.
    ///
    /// The iterator has its own file handle, so it doesn't contend with
    /// lookups on this table.
    pub fn iter(&self) -> Result<SSTableIterator> {
        SSTableIterator::new(&self.path, self.stop_pos)
    }

    /// Delete the backing file. The table stays usable for lookups through
    /// its already-open handle on platforms that allow it.
    pub fn remove_file(&self) -> Result<()> {
        fs::remove_file(&self.path)?;
        Ok(())
    }

    /// Membership filter for this table.
    pub fn filter(&self) -> &BloomFilter {
        &self.filter
    }

    /// Offset where the record region ends and the filter blob begins.
    pub fn stop_pos(&self) -> u64 {
        self.stop_pos
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn read_chunk(file: &File, pos: u64, buf: &mut [u8]) -> Result<usize> {
    use std::os::unix::fs::FileExt;
    Ok(file.read_at(buf, pos)?)
}

#[cfg(windows)]
fn read_chunk(file: &File, pos: u64, buf: &mut [u8]) -> Result<usize> {
    use std::os::windows::fs::FileExt;
    Ok(file.seek_read(buf, pos)?)
}
