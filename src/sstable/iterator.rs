use std::fs::File;
use std::io::{BufRead, BufReader, Read, Take};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::iterator::StorageIterator;
use crate::sstable::record::{self, KEY_DELIM};
use crate::types::{Key, Value};

/// Read-ahead buffer for sequential scans.
const SCAN_BUFFER_SIZE: usize = 64 * 1024;

/// Lazy cursor over an SSTable's records in ascending key order.
///
/// Holds exactly one decoded record at a time. The reader is capped at
/// `stop_pos`, so the filter blob is never mistaken for record bytes.
pub struct SSTableIterator {
    path: PathBuf,
    reader: BufReader<Take<File>>,
    current: Option<(Key, Value)>,
    buf: Vec<u8>,
}

impl SSTableIterator {
    pub(crate) fn new(path: &Path, stop_pos: u64) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(SCAN_BUFFER_SIZE, file.take(stop_pos));

        // The data region starts with the first record's KEY_DELIM.
        let mut buf = Vec::new();
        let n = reader.read_until(KEY_DELIM, &mut buf)?;
        if n > 0 && buf != [KEY_DELIM] {
            return Err(Error::Corruption(format!(
                "{}: data region doesn't start with a record",
                path.display()
            )));
        }

        let mut iter = SSTableIterator {
            path: path.to_path_buf(),
            reader,
            current: None,
            buf,
        };
        iter.advance()?;
        Ok(iter)
    }

    /// Read the next record body up to (and consuming) the next KEY_DELIM.
    fn advance(&mut self) -> Result<()> {
        self.buf.clear();
        if self.reader.read_until(KEY_DELIM, &mut self.buf)? == 0 {
            self.current = None;
            return Ok(());
        }
        if self.buf.last() == Some(&KEY_DELIM) {
            self.buf.pop();
        }
        match record::decode_body(&self.buf) {
            Some(entry) => {
                self.current = Some(entry);
                Ok(())
            }
            None => Err(Error::Corruption(format!(
                "{}: malformed record",
                self.path.display()
            ))),
        }
    }
}

impl StorageIterator for SSTableIterator {
    fn key(&self) -> &[u8] {
        self.current.as_ref().map(|(k, _)| k.as_slice()).unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map(|(_, v)| v.as_slice()).unwrap_or_default()
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) -> Result<()> {
        self.advance()
    }
}
