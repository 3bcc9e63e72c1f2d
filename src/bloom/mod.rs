pub mod builder;

use std::f64::consts::LN_2;

use xxhash_rust::xxh3::xxh3_128;

use crate::error::{Error, Result};

/// Guards the hash-count computation against `ceil` landing one short after
/// floating-point rounding.
const HASH_COUNT_EPSILON: f64 = 1e-9;

/// Probabilistic data structure: "is this key in the set?"
///
/// - If any probed bit is 0 → key is DEFINITELY NOT in the set
/// - If all probed bits are 1 → key is PROBABLY in the set
///
/// The bit count is fixed for the lifetime of the filter and is the only thing
/// persisted: an SSTable stores the raw bit array as a `ceil(bits / 8)` byte
/// blob at its tail.
///
/// Probe positions use double hashing over the key's 128-bit xxh3 hash:
/// `h_i = (h1 + i · h2) mod S`, with h1 and h2 its two 64-bit halves. Both the
/// hash and the formula are fixed, so positions never change across builds,
/// and the first `k` positions of a key are a prefix of its first `k + 1`.
/// That is what makes two things safe:
///
/// - checking with fewer hashes than were used to insert (reopened filters
///   don't know their original `k` and use 1)
/// - OR-ing filters built with different `k`, as long as the result is queried
///   with the smallest of them
///
/// False-positive rate ≈ (1 − e^(−kn/S))^k.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Box<[u8]>,
    num_bits: usize,
    num_hashes: usize,
}

impl BloomFilter {
    /// Create an empty filter of `num_bits` bits sized for `expected_items`.
    ///
    /// `k = ceil((S / n) · ln 2)`, never less than 1. An `expected_items` of 0
    /// is treated as 1.
    pub fn new(num_bits: usize, expected_items: usize) -> Self {
        let num_bits = num_bits.max(1);
        Self {
            bits: vec![0u8; Self::serialized_size_for(num_bits)].into_boxed_slice(),
            num_bits,
            num_hashes: Self::optimal_hashes(num_bits, expected_items),
        }
    }

    /// Rebuild a filter from a raw bit blob read off disk.
    ///
    /// The hash count isn't stored anywhere, so the filter only trusts the
    /// first probe of each key.
    pub fn from_bytes(num_bits: usize, data: &[u8]) -> Result<Self> {
        let num_bits = num_bits.max(1);
        let expected = Self::serialized_size_for(num_bits);
        if data.len() != expected {
            return Err(Error::Corruption(format!(
                "filter blob is {} bytes, expected {}",
                data.len(),
                expected
            )));
        }
        Ok(Self {
            bits: data.to_vec().into_boxed_slice(),
            num_bits,
            num_hashes: 1,
        })
    }

    /// Number of probes for `num_bits` bits holding `expected_items` keys.
    pub fn optimal_hashes(num_bits: usize, expected_items: usize) -> usize {
        let n = expected_items.max(1) as f64;
        let k = ((num_bits as f64 / n) * LN_2).ceil() + HASH_COUNT_EPSILON;
        (k as usize).max(1)
    }

    /// Add a key to the filter.
    pub fn insert(&mut self, key: &[u8]) {
        for pos in self.probes(key) {
            self.bits[pos / 8] |= 1 << (pos % 8);
        }
    }

    /// Check if a key MIGHT be in the set.
    /// false → definitely not here. true → probably here.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        self.probes(key)
            .all(|pos| self.bits[pos / 8] & (1 << (pos % 8)) != 0)
    }

    /// OR `other` into this filter.
    ///
    /// Afterwards the filter answers for the union of both key sets. It keeps
    /// the smaller of the two hash counts, since a key inserted with `k` probes
    /// only guarantees its first `k` positions are set.
    pub fn union(&mut self, other: &BloomFilter) -> Result<()> {
        if self.num_bits != other.num_bits {
            return Err(Error::FilterMismatch {
                left: self.num_bits,
                right: other.num_bits,
            });
        }
        for (dst, src) in self.bits.iter_mut().zip(other.bits.iter()) {
            *dst |= *src;
        }
        self.num_hashes = self.num_hashes.min(other.num_hashes);
        Ok(())
    }

    /// The raw bit array, exactly as it is written to disk.
    pub fn serialized_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Size of the on-disk blob in bytes: `ceil(S / 8)`.
    pub fn serialized_size(&self) -> usize {
        self.bits.len()
    }

    /// Blob size for a filter of `num_bits` bits.
    pub const fn serialized_size_for(num_bits: usize) -> usize {
        num_bits.div_ceil(8)
    }

    /// Get the number of hash functions used.
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Get the total number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Whether no bit has been set yet.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|b| *b == 0)
    }

    /// The first `num_hashes` bit positions of `key`.
    fn probes(&self, key: &[u8]) -> impl Iterator<Item = usize> + use<> {
        let hash = xxh3_128(key);
        let h1 = hash as u64;
        let h2 = (hash >> 64) as u64;
        let num_bits = self.num_bits as u64;
        (0..self.num_hashes as u64)
            .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % num_bits) as usize)
    }
}
