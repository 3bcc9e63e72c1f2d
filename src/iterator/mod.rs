pub mod merge;

use crate::error::Result;

/// The central iteration abstraction for the storage engine.
///
/// Every sorted data source (SSTable scan, merged view) implements this
/// trait, so MergeIterator can take `Vec<Box<dyn StorageIterator>>` and
/// merge them.
pub trait StorageIterator {
    /// Returns the current key. Only valid when is_valid() is true.
    fn key(&self) -> &[u8];

    /// Returns the current value. Only valid when is_valid() is true.
    fn value(&self) -> &[u8];

    /// Returns true if the iterator is positioned at a valid entry.
    fn is_valid(&self) -> bool;

    /// Advances to the next entry. Returns error on IO failure.
    fn next(&mut self) -> Result<()>;
}
