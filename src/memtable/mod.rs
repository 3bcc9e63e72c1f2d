use std::collections::HashMap;

use crate::types::{Key, Value};

/// In-memory buffer for writes.
///
/// Every write goes here first. When the entry count reaches the engine's
/// buffer capacity, the contents are drained and flushed to an SSTable.
/// Overwrites replace the previous value (last write wins). There are no
/// tombstones: the engine has no delete.
#[derive(Debug, Default)]
pub struct MemTable {
    data: HashMap<Key, Value>,
}

impl MemTable {
    /// Create a new empty memtable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a key-value pair.
    /// Returns the number of entries after the write, for the flush check.
    pub fn put(&mut self, key: Key, value: Value) -> usize {
        self.data.insert(key, value);
        self.data.len()
    }

    /// Look up a key.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Detach every entry, leaving the memtable empty and ready for writes.
    ///
    /// The map is swapped out rather than copied, so this is O(1) and safe to
    /// call while holding the engine's write lock. Entries are unordered; the
    /// flush path sorts them.
    pub fn drain(&mut self) -> HashMap<Key, Value> {
        std::mem::take(&mut self.data)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A drained memtable waiting to be written out.
///
/// Stays readable until the SSTable holding the same entries has been
/// published, so lookups never miss data that is in flight to disk.
#[derive(Debug)]
pub struct ImmutableMemTable {
    id: u64,
    data: HashMap<Key, Value>,
}

impl ImmutableMemTable {
    /// Freeze a drained entry set. `id` only has to be unique per engine; it
    /// lets the flush path find this table again in the engine state.
    pub fn new(id: u64, data: HashMap<Key, Value>) -> Self {
        Self { id, data }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Entries sorted by key (byte-lexicographic), ready to be written.
    pub fn sorted_entries(&self) -> Vec<(&[u8], &[u8])> {
        let mut entries: Vec<(&[u8], &[u8])> = self
            .data
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
