//! # lsmkv
//!
//! An embedded key-value store built as a Log-Structured Merge-Tree.
//!
//! ## Core idea
//! Writes land in an in-memory buffer. A full buffer is written out as an
//! immutable sorted file (a run) at level 0. When a level collects
//! `run_threshold` runs, the oldest of them are merged into one run on the
//! next level. Reads check the buffer, then each level from newest run to
//! oldest, and every run carries a membership filter so most misses never
//! touch the disk.
//!
//! ```no_run
//! use lsmkv::{DB, Options};
//!
//! let db = DB::open(Options::new("/tmp/lsmkv-demo"))?;
//! db.put(b"hello", b"world")?;
//! assert_eq!(db.get(b"hello")?, Some(b"world".to_vec()));
//! # Ok::<(), lsmkv::Error>(())
//! ```

pub mod bloom;
pub mod compaction;
pub mod db;
pub mod error;
pub mod filename;
pub mod iterator;
pub mod level;
pub mod memtable;
pub mod sstable;
pub mod types;

// Public re-exports for the top-level API
pub use db::{DB, Options, Stats};
pub use error::{Error, Result};
