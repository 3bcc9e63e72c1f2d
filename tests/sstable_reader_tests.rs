// SSTable write + read: point lookups by byte-offset binary search, scans,
// reopening with only the filter size known.

use lsmkv::Error;
use lsmkv::bloom::BloomFilter;
use lsmkv::bloom::builder::BloomFilterBuilder;
use lsmkv::iterator::StorageIterator;
use lsmkv::sstable::builder::SSTableBuilder;
use lsmkv::sstable::reader::SSTable;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const FILTER_BITS: usize = 4096;

fn write_table(path: &Path, entries: &[(Vec<u8>, Vec<u8>)]) -> SSTable {
    let filter = BloomFilterBuilder::new(FILTER_BITS, entries.len());
    let mut builder = SSTableBuilder::new(path, filter).unwrap();
    for (k, v) in entries {
        builder.add(k, v).unwrap();
    }
    builder.finish().unwrap()
}

fn numbered(n: u32) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..n)
        .map(|i| {
            (
                format!("key_{:05}", i).into_bytes(),
                format!("val_{:05}", i).into_bytes(),
            )
        })
        .collect()
}

// =============================================================================
// Test 1: Write 1000 entries, reopen, get all → correct values
// =============================================================================
#[test]
fn read_1000_entries_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    write_table(&path, &numbered(1000));

    let sstable = SSTable::open(&path, FILTER_BITS).unwrap();
    for i in 0..1000u32 {
        let key = format!("key_{:05}", i);
        let expected_val = format!("val_{:05}", i);
        let result = sstable.get(key.as_bytes()).unwrap();
        assert_eq!(result, Some(expected_val.into_bytes()), "Failed for key {}", key);
    }
}

// =============================================================================
// Test 2: Missing keys → None (before, between, after)
// =============================================================================
#[test]
fn get_nonexistent_key_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    write_table(
        &path,
        &[
            (b"aaa".to_vec(), b"value_aaa".to_vec()),
            (b"ccc".to_vec(), b"value_ccc".to_vec()),
            (b"eee".to_vec(), b"value_eee".to_vec()),
        ],
    );

    let sstable = SSTable::open(&path, FILTER_BITS).unwrap();
    assert_eq!(sstable.get(b"___").unwrap(), None);
    assert_eq!(sstable.get(b"bbb").unwrap(), None);
    assert_eq!(sstable.get(b"ddd").unwrap(), None);
    assert_eq!(sstable.get(b"zzz").unwrap(), None);
    assert_eq!(sstable.get(b"aa").unwrap(), None);
    assert_eq!(sstable.get(b"aaaa").unwrap(), None);
}

// =============================================================================
// Test 3: Misses across a large table never report a value
// =============================================================================
#[test]
fn misses_in_large_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    write_table(&path, &numbered(2000));

    let sstable = SSTable::open(&path, FILTER_BITS).unwrap();
    for i in 0..2000u32 {
        // sorts right after key_{i}, before key_{i+1}
        let key = format!("key_{:05}x", i);
        assert_eq!(sstable.get(key.as_bytes()).unwrap(), None, "{key}");
    }
}

// =============================================================================
// Test 4: Delimiter bytes inside keys and values
// =============================================================================
#[test]
fn binary_keys_and_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    let entries = vec![
        (b"".to_vec(), b"empty key".to_vec()),
        (b"\x00".to_vec(), b"\x01\x00\x02".to_vec()),
        (b"\x00\x00".to_vec(), b"".to_vec()),
        (b"\x01".to_vec(), b"\x00".to_vec()),
        (b"\x02\x10".to_vec(), b"\x02\x11\x02\x12".to_vec()),
        (b"plain".to_vec(), b"\xff\xfe".to_vec()),
    ];
    write_table(&path, &entries);

    let sstable = SSTable::open(&path, FILTER_BITS).unwrap();
    for (k, v) in &entries {
        assert_eq!(sstable.get(k).unwrap().as_ref(), Some(v), "{k:?}");
    }
    assert_eq!(sstable.get(b"\x02").unwrap(), None);
    assert_eq!(sstable.get(b"\x00\x01").unwrap(), None);
}

// =============================================================================
// Test 5: Values much larger than a read chunk
// =============================================================================
#[test]
fn large_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..50u8)
        .map(|i| (vec![b'k', i], vec![i; 3000 + i as usize]))
        .collect();
    write_table(&path, &entries);

    let sstable = SSTable::open(&path, FILTER_BITS).unwrap();
    for (k, v) in &entries {
        assert_eq!(sstable.get(k).unwrap().as_ref(), Some(v));
    }
}

// =============================================================================
// Test 6: File layout: records, then the filter blob at the tail
// =============================================================================
#[test]
fn filter_blob_is_file_tail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    let table = write_table(&path, &[(b"a".to_vec(), b"1".to_vec())]);

    let bytes = fs::read(&path).unwrap();
    let blob = BloomFilter::serialized_size_for(FILTER_BITS);
    assert_eq!(&bytes[..bytes.len() - blob], b"\x00a\x011");
    assert_eq!(table.stop_pos(), (bytes.len() - blob) as u64);
    assert_eq!(&bytes[bytes.len() - blob..], table.filter().serialized_bytes());
}

// =============================================================================
// Test 7: Empty table is just a filter
// =============================================================================
#[test]
fn empty_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    write_table(&path, &[]);

    let sstable = SSTable::open(&path, FILTER_BITS).unwrap();
    assert_eq!(sstable.stop_pos(), 0);
    assert_eq!(sstable.get(b"anything").unwrap(), None);
    assert!(!sstable.iter().unwrap().is_valid());
}

// =============================================================================
// Test 8: Iterator yields every record in order
// =============================================================================
#[test]
fn iterator_scans_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    let entries = numbered(300);
    write_table(&path, &entries);

    let sstable = SSTable::open(&path, FILTER_BITS).unwrap();
    let mut iter = sstable.iter().unwrap();
    let mut seen = Vec::new();
    while iter.is_valid() {
        seen.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.next().unwrap();
    }
    assert_eq!(seen, entries);
}

// =============================================================================
// Test 9: Builder rejects unsorted or duplicate keys
// =============================================================================
#[test]
fn builder_requires_ascending_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    let mut builder = SSTableBuilder::new(&path, BloomFilterBuilder::new(FILTER_BITS, 2)).unwrap();
    builder.add(b"b", b"1").unwrap();
    assert!(matches!(builder.add(b"b", b"2"), Err(Error::InvalidArgument(_))));
    assert!(matches!(builder.add(b"a", b"3"), Err(Error::InvalidArgument(_))));
}

// =============================================================================
// Test 10: File shorter than its filter is corruption
// =============================================================================
#[test]
fn truncated_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.sst");
    fs::write(&path, b"\x00a\x011").unwrap();

    assert!(matches!(
        SSTable::open(&path, FILTER_BITS),
        Err(Error::Corruption(_))
    ));
}
