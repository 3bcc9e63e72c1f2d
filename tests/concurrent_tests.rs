// Engine shared across threads, with inline and background flushing.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use lsmkv::{DB, Error, Options};
use tempfile::tempdir;

fn options(dir: &Path, background_flush: bool) -> Options {
    Options {
        buffer_capacity: 32,
        run_threshold: 3,
        filter_bits: 2048,
        background_flush,
        ..Options::new(dir)
    }
}

fn key(thread: u32, i: u32) -> Vec<u8> {
    format!("t{thread}_k{i:05}").into_bytes()
}

fn write_from_threads(db: &Arc<DB>, threads: u32, per_thread: u32) {
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let db = Arc::clone(db);
            thread::spawn(move || {
                for i in 0..per_thread {
                    db.put(&key(t, i), &i.to_le_bytes()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

// =============================================================================
// Test 1: Concurrent writers with inline flushes
// =============================================================================
#[test]
fn concurrent_writers_inline_flush() {
    let dir = tempdir().unwrap();
    let db = Arc::new(DB::open(options(dir.path(), false)).unwrap());

    write_from_threads(&db, 4, 500);

    for t in 0..4 {
        for i in 0..500 {
            assert_eq!(db.get(&key(t, i)).unwrap(), Some(i.to_le_bytes().to_vec()));
        }
    }
    assert!(db.stats().compactions > 0);
}

// =============================================================================
// Test 2: Background flushes drain after wait_idle
// =============================================================================
#[test]
fn background_flush_drains_on_wait_idle() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let db = Arc::new(DB::open(options(dir.path(), true)).unwrap());

    write_from_threads(&db, 4, 500);
    db.wait_idle().unwrap();

    let stats = db.stats();
    assert_eq!(stats.frozen, 0);
    // 2000 distinct keys, 32 per flush
    assert_eq!(stats.flushes, 2000 / 32);
    assert!(stats.runs_per_level.iter().all(|runs| *runs < 3));
    for t in 0..4 {
        for i in 0..500 {
            assert_eq!(db.get(&key(t, i)).unwrap(), Some(i.to_le_bytes().to_vec()));
        }
    }
}

// =============================================================================
// Test 3: Readers never lose a key while it moves to disk
// =============================================================================
#[test]
fn readers_see_written_keys_during_flushes() {
    let dir = tempdir().unwrap();
    let db = Arc::new(DB::open(options(dir.path(), true)).unwrap());

    // Seed, then keep re-reading the seed while a writer churns the levels.
    for i in 0..100 {
        db.put(&key(9, i), b"seed").unwrap();
    }
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let db = Arc::clone(&db);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    for i in 0..100 {
                        assert_eq!(db.get(&key(9, i)).unwrap(), Some(b"seed".to_vec()));
                    }
                }
            })
        })
        .collect();

    for i in 0..3000 {
        db.put(&key(0, i), b"churn").unwrap();
    }
    db.wait_idle().unwrap();
    done.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(db.stats().compactions > 0);
}

// =============================================================================
// Test 4: Closing drains queued flushes before stopping
// =============================================================================
#[test]
fn close_finishes_queued_flushes() {
    let dir = tempdir().unwrap();
    {
        let db = DB::open(options(dir.path(), true)).unwrap();
        for i in 0..320 {
            db.put(&key(0, i), b"v").unwrap();
        }
        db.close().unwrap();
    }

    let db = DB::open(options(dir.path(), false)).unwrap();
    for i in 0..320 {
        assert_eq!(db.get(&key(0, i)).unwrap(), Some(b"v".to_vec()));
    }
}

// =============================================================================
// Test 5: A failed background flush is reported, not swallowed
// =============================================================================
#[test]
fn background_flush_failure_reaches_caller() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let db_dir = dir.path().join("db");
    let db = DB::open(options(&db_dir, true)).unwrap();

    fs::remove_dir_all(&db_dir).unwrap();
    for i in 0..32 {
        db.put(&key(0, i), b"v").unwrap();
    }

    assert!(matches!(db.wait_idle(), Err(Error::Io(_))));
    assert_eq!(db.stats().frozen, 1);
    // still served from the frozen memtable
    assert_eq!(db.get(&key(0, 7)).unwrap(), Some(b"v".to_vec()));

    assert!(matches!(db.close(), Err(Error::Io(_))));
    assert_eq!(db.stats().frozen, 1);
    assert_eq!(db.stats().flushes, 0);
}

// =============================================================================
// Test 6: close writes out what the worker failed to flush
// =============================================================================
#[test]
fn close_retries_failed_background_flush() {
    let dir = tempdir().unwrap();
    let db_dir = dir.path().join("db");
    {
        let db = DB::open(options(&db_dir, true)).unwrap();
        fs::remove_dir_all(&db_dir).unwrap();
        for i in 0..32 {
            db.put(&key(0, i), b"v").unwrap();
        }
        assert!(db.wait_idle().is_err());
        // reported once
        db.wait_idle().unwrap();

        fs::create_dir_all(&db_dir).unwrap();
        db.close().unwrap();
        assert_eq!(db.stats().frozen, 0);
        assert_eq!(db.stats().flushes, 1);
    }

    let db = DB::open(options(&db_dir, false)).unwrap();
    assert_eq!(db.stats().runs_per_level, vec![1]);
    for i in 0..32 {
        assert_eq!(db.get(&key(0, i)).unwrap(), Some(b"v".to_vec()));
    }
}
