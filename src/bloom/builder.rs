use crate::bloom::BloomFilter;
use crate::error::{Error, Result};

/// Convenience builder for constructing a bloom filter during SSTable creation.
///
/// Two ways to get one:
/// - [`BloomFilterBuilder::new`] for a flush: every key written to the table
///   is inserted as it goes by.
/// - [`BloomFilterBuilder::merged`] for a compaction: the filter starts as the
///   OR of the source tables' filters, which already covers every key the
///   merge will write, so `add_key` is a no-op.
pub struct BloomFilterBuilder {
    filter: BloomFilter,
    track_keys: bool,
}

impl BloomFilterBuilder {
    /// Create a builder expecting approximately `estimated_keys` keys.
    pub fn new(num_bits: usize, estimated_keys: usize) -> Self {
        BloomFilterBuilder {
            filter: BloomFilter::new(num_bits, estimated_keys),
            track_keys: true,
        }
    }

    /// Start from the union of `sources`. All of them must share one bit count.
    pub fn merged<'a, I>(num_bits: usize, sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a BloomFilter>,
    {
        let mut sources = sources.into_iter();
        let mut filter = match sources.next() {
            Some(first) if first.num_bits() != num_bits => {
                return Err(Error::FilterMismatch {
                    left: num_bits,
                    right: first.num_bits(),
                });
            }
            Some(first) => first.clone(),
            None => BloomFilter::new(num_bits, 1),
        };
        for source in sources {
            filter.union(source)?;
        }
        Ok(BloomFilterBuilder {
            filter,
            track_keys: false,
        })
    }

    /// Add a key to the bloom filter being built.
    pub fn add_key(&mut self, key: &[u8]) {
        if self.track_keys {
            self.filter.insert(key);
        }
    }

    /// Bit count of the filter under construction.
    pub fn num_bits(&self) -> usize {
        self.filter.num_bits()
    }

    /// Finalize and return the bloom filter.
    pub fn build(self) -> BloomFilter {
        self.filter
    }
}
