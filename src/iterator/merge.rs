use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::binary_heap::PeekMut;

use crate::error::Result;
use crate::iterator::StorageIterator;

/// One source in the merge heap, tagged with its position in the input list.
struct HeapWrapper(usize, Box<dyn StorageIterator>);

impl PartialEq for HeapWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapWrapper {}

impl PartialOrd for HeapWrapper {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapWrapper {
    /// `BinaryHeap` pops the greatest element, so "greater" here means
    /// smaller key, and on equal keys, the later (newer) source.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .1
            .key()
            .cmp(self.1.key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

/// Merges multiple sorted iterators into a single sorted stream.
///
/// Used for compaction: the runs picked from a level are merged into one
/// run for the next level.
///
/// Sources are ordered by age: index 0 is the oldest, the last one the
/// newest. When several sources hold the same key, only the entry from the
/// newest source is yielded; the others are skipped as stale.
///
/// Each source is pulled one record at a time, so the merge does
/// O(total records · log sources) work and holds one record per source.
pub struct MergeIterator {
    heap: BinaryHeap<HeapWrapper>,
    current: Option<HeapWrapper>,
}

impl MergeIterator {
    /// Create a new MergeIterator from multiple sorted sources, oldest first.
    pub fn new(iters: Vec<Box<dyn StorageIterator>>) -> Result<Self> {
        let mut heap: BinaryHeap<HeapWrapper> = iters
            .into_iter()
            .enumerate()
            .filter(|(_, iter)| iter.is_valid())
            .map(|(idx, iter)| HeapWrapper(idx, iter))
            .collect();
        let current = heap.pop();
        Ok(MergeIterator { heap, current })
    }
}

impl StorageIterator for MergeIterator {
    fn key(&self) -> &[u8] {
        self.current.as_ref().map(|c| c.1.key()).unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map(|c| c.1.value()).unwrap_or_default()
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) -> Result<()> {
        let Some(mut current) = self.current.take() else {
            return Ok(());
        };

        // Drop every older copy of the key we just yielded.
        while let Some(mut top) = self.heap.peek_mut() {
            if top.1.key() != current.1.key() {
                break;
            }
            if let Err(e) = top.1.next() {
                PeekMut::pop(top);
                return Err(e);
            }
            if !top.1.is_valid() {
                PeekMut::pop(top);
            }
        }

        current.1.next()?;
        if current.1.is_valid() {
            self.heap.push(current);
        }
        self.current = self.heap.pop();
        Ok(())
    }
}
