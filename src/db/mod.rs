//! The engine: one memtable in front of a list of on-disk levels.
//!
//! Write path: `put` → memtable. When the memtable reaches
//! `buffer_capacity` entries it is swapped for an empty one and the old one
//! becomes a frozen (read-only) memtable, which is flushed to a new run at
//! level 0. Each flush is followed by a compaction check that may cascade up
//! through the levels.
//!
//! Read path: memtable → frozen memtables (newest first) → level 0, 1, ...
//! and within each level, newest run first. The first hit wins.
//!
//! Concurrency:
//! - the memtable sits behind its own `RwLock`
//! - frozen memtables and levels form an immutable [`DbState`] snapshot behind
//!   `state`; every change installs a new snapshot, readers clone the `Arc`
//!   and search without holding a lock
//! - flushes and compactions are serialised by `state_lock`, which also owns
//!   the run-number counters

pub mod options;
mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::compaction::CompactionTask;
use crate::error::{Error, Result};
use crate::filename::{remove_temp_files, scan_dir, sync_dir, table_path};
use crate::level::{Level, Run};
use crate::memtable::{ImmutableMemTable, MemTable};
use crate::sstable::builder::build_from_memtable;
use crate::sstable::reader::SSTable;
use crate::types::{RunId, Value};

pub use options::Options;
use worker::FlushTask;

/// Point-in-time view of everything below the active memtable.
#[derive(Debug, Clone, Default)]
pub(crate) struct DbState {
    /// Memtables waiting to be flushed, oldest first.
    frozen: Vec<Arc<ImmutableMemTable>>,
    /// Level 0 first.
    levels: Vec<Level>,
}

/// Engine counters and shape, for monitoring and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Entries in the active memtable.
    pub buffered: usize,
    /// Frozen memtables not yet flushed.
    pub frozen: usize,
    /// Number of runs on each level, level 0 first.
    pub runs_per_level: Vec<usize>,
    /// Memtable flushes since open.
    pub flushes: u64,
    /// Level merges since open.
    pub compactions: u64,
}

/// Next run number for each level. Numbers are never reused.
#[derive(Debug, Default)]
struct RunCounters {
    next: Vec<u64>,
}

impl RunCounters {
    fn allocate(&mut self, level: usize) -> RunId {
        if self.next.len() <= level {
            self.next.resize(level + 1, 0);
        }
        let run = self.next[level];
        self.next[level] += 1;
        RunId::new(level, run)
    }

    /// Account for a run found on disk.
    fn observe(&mut self, id: RunId) {
        if self.next.len() <= id.level {
            self.next.resize(id.level + 1, 0);
        }
        self.next[id.level] = self.next[id.level].max(id.run + 1);
    }
}

pub(crate) struct DbInner {
    options: Options,
    memtable: RwLock<MemTable>,
    state: RwLock<Arc<DbState>>,
    state_lock: Mutex<RunCounters>,
    next_frozen_id: AtomicU64,
    flushes: AtomicU64,
    compactions: AtomicU64,
    /// First background flush failure not yet reported to the caller.
    flush_error: Mutex<Option<Error>>,
}

impl DbInner {
    fn snapshot(&self) -> Arc<DbState> {
        self.state.read().clone()
    }

    /// Copy the current state, let `f` edit the copy, install it.
    fn update_state(&self, f: impl FnOnce(&mut DbState)) {
        let mut guard = self.state.write();
        let mut next = DbState::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }

    /// Swap the memtable for an empty one and publish the old contents as a
    /// frozen memtable. The caller holds the memtable write lock, so no
    /// reader can observe the gap between the two steps.
    fn freeze(&self, memtable: &mut MemTable) {
        let id = self.next_frozen_id.fetch_add(1, Ordering::Relaxed);
        let frozen = Arc::new(ImmutableMemTable::new(id, memtable.drain()));
        debug!("froze memtable {} with {} entries", id, frozen.len());
        self.update_state(|state| state.frozen.push(frozen));
    }

    /// Flush every frozen memtable, oldest first, running the compaction
    /// cascade after each one.
    fn flush_pending(&self) -> Result<()> {
        let mut counters = self.state_lock.lock();
        while let Some(frozen) = self.snapshot().frozen.first().cloned() {
            self.flush_frozen(&mut counters, &frozen)?;
            self.compact_from(&mut counters, 0)?;
        }
        Ok(())
    }

    /// Remember a background flush failure for `wait_idle` or `close`.
    /// Only the first one is kept until it is reported.
    fn record_flush_error(&self, err: Error) {
        let mut slot = self.flush_error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn take_flush_error(&self) -> Result<()> {
        match self.flush_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn flush_frozen(&self, counters: &mut RunCounters, frozen: &Arc<ImmutableMemTable>) -> Result<()> {
        let id = counters.allocate(0);
        let path = table_path(&self.options.dir, id);
        let table = build_from_memtable(&path, frozen, self.options.filter_bits)?;
        sync_dir(&self.options.dir)?;

        self.update_state(|state| {
            if state.levels.is_empty() {
                state.levels.push(Level::new());
            }
            state.levels[0].push(Run::new(id, table));
            state.frozen.retain(|f| f.id() != frozen.id());
        });
        self.flushes.fetch_add(1, Ordering::Relaxed);
        info!("flushed {} entries to {}", frozen.len(), path.display());
        Ok(())
    }

    /// Compaction cascade starting at `start`. Walks levels upward; a level
    /// at or above the threshold is merged into the next one and checked
    /// again before moving on.
    fn compact_from(&self, counters: &mut RunCounters, start: usize) -> Result<()> {
        let threshold = self.options.run_threshold;
        let mut level = start;
        loop {
            let snapshot = self.snapshot();
            if level >= snapshot.levels.len() {
                return Ok(());
            }
            let Some(task) = CompactionTask::pick(&snapshot.levels, level, threshold) else {
                level += 1;
                continue;
            };

            let target = task.target_level();
            let id = counters.allocate(target);
            let path = table_path(&self.options.dir, id);
            let table = task.run(&path, self.options.filter_bits)?;
            sync_dir(&self.options.dir)?;

            let merged = task.inputs.len();
            self.update_state(|state| {
                state.levels[level].remove_oldest(merged);
                if state.levels.len() <= target {
                    state.levels.push(Level::new());
                }
                state.levels[target].push(Run::new(id, table));
            });
            task.remove_inputs();
            sync_dir(&self.options.dir)?;
            self.compactions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// An embedded key-value store. Cheap to share across threads behind an
/// `Arc`; every method takes `&self`.
pub struct DB {
    inner: Arc<DbInner>,
    flush_tx: Option<Sender<FlushTask>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl DB {
    /// Open the engine in `options.dir`, rebuilding the levels from the run
    /// files found there.
    ///
    /// Memtable contents from a previous session are not recovered: only
    /// flushed data survives a restart.
    pub fn open(options: Options) -> Result<Self> {
        options.validate()?;
        if options.create_if_missing {
            std::fs::create_dir_all(&options.dir)?;
        } else if !options.dir.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "{} does not exist",
                options.dir.display()
            )));
        }

        let mut counters = RunCounters::default();
        let mut levels: Vec<Level> = Vec::new();
        let unfinished = remove_temp_files(&options.dir)?;
        if unfinished > 0 {
            warn!("removed {unfinished} unfinished run files from {}", options.dir.display());
        }
        let found = scan_dir(&options.dir)?;
        for (id, path) in &found {
            let table = SSTable::open(path, options.filter_bits)?;
            while levels.len() <= id.level {
                levels.push(Level::new());
            }
            levels[id.level].push(Run::new(*id, table));
            counters.observe(*id);
        }
        info!(
            "opened {} with {} runs across {} levels",
            options.dir.display(),
            found.len(),
            levels.len()
        );

        let inner = Arc::new(DbInner {
            memtable: RwLock::new(MemTable::new()),
            state: RwLock::new(Arc::new(DbState {
                frozen: Vec::new(),
                levels,
            })),
            state_lock: Mutex::new(counters),
            next_frozen_id: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            flush_error: Mutex::new(None),
            options,
        });

        // A previous session may have stopped between a flush and its
        // compaction, or used a larger threshold.
        {
            let mut counters = inner.state_lock.lock();
            inner.compact_from(&mut counters, 0)?;
        }

        let (flush_tx, worker) = if inner.options.background_flush {
            let (tx, rx) = crossbeam_channel::unbounded();
            let handle = worker::spawn(inner.clone(), rx)?;
            (Some(tx), Some(handle))
        } else {
            (None, None)
        };

        Ok(DB {
            inner,
            flush_tx,
            worker: Mutex::new(worker),
            closed: AtomicBool::new(false),
        })
    }

    /// Insert or overwrite a key. May flush the memtable and run compactions
    /// before returning, unless flushes happen in the background.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;
        {
            let mut memtable = self.inner.memtable.write();
            if memtable.put(key.to_vec(), value.to_vec()) < self.inner.options.buffer_capacity {
                return Ok(());
            }
            self.inner.freeze(&mut memtable);
        }
        self.schedule_flush()
    }

    /// Look a key up. Returns the value of the most recent `put` for it.
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        self.check_open()?;
        if let Some(value) = self.inner.memtable.read().get(key) {
            return Ok(Some(value.to_vec()));
        }

        // Taken after the memtable check: a freeze publishes the frozen
        // memtable before releasing the memtable lock.
        let state = self.inner.snapshot();
        for frozen in state.frozen.iter().rev() {
            if let Some(value) = frozen.get(key) {
                return Ok(Some(value.to_vec()));
            }
        }
        for level in &state.levels {
            if let Some(value) = level.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Flush the memtable now, whatever its size. A no-op when it's empty.
    pub fn force_flush(&self) -> Result<()> {
        self.check_open()?;
        {
            let mut memtable = self.inner.memtable.write();
            if memtable.is_empty() {
                return Ok(());
            }
            self.inner.freeze(&mut memtable);
        }
        self.schedule_flush()
    }

    /// Block until the background worker has finished every flush queued so
    /// far. Returns immediately when flushes run inline. A background flush
    /// that failed since the last call is reported here; its memtable stays
    /// frozen and readable.
    pub fn wait_idle(&self) -> Result<()> {
        let Some(tx) = &self.flush_tx else {
            return Ok(());
        };
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        tx.send(FlushTask::Barrier(done_tx)).map_err(|_| Error::Closed)?;
        done_rx.recv().map_err(|_| Error::Closed)?;
        self.inner.take_flush_error()
    }

    pub fn stats(&self) -> Stats {
        let buffered = self.inner.memtable.read().len();
        let state = self.inner.snapshot();
        Stats {
            buffered,
            frozen: state.frozen.len(),
            runs_per_level: state.levels.iter().map(Level::len).collect(),
            flushes: self.inner.flushes.load(Ordering::Relaxed),
            compactions: self.inner.compactions.load(Ordering::Relaxed),
        }
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Stop the background worker once it has drained its queue. Memtable
    /// contents that were never frozen are dropped. Frozen memtables the
    /// worker failed to flush get one more inline attempt; if that fails too
    /// the error is returned. An unreported background failure is also
    /// returned, unless the retry wrote everything out. Later calls to other
    /// methods fail with [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(tx) = &self.flush_tx {
            let _ = tx.send(FlushTask::Shutdown);
        }
        if let Some(handle) = self.worker.lock().take() {
            handle.join().map_err(|_| Error::Closed)?;
        }
        let reported = self.inner.take_flush_error();

        // Frozen memtables still here failed to flush. One more try, inline.
        if !self.inner.snapshot().frozen.is_empty() {
            if let Err(e) = self.inner.flush_pending() {
                let lost = self.inner.snapshot().frozen.len();
                error!("{lost} frozen memtables not written on close: {e}");
                return Err(e);
            }
            if let Err(e) = reported {
                warn!("retried flush after background failure: {e}");
            }
        } else {
            reported?;
        }
        info!("closed {}", self.inner.options.dir.display());
        Ok(())
    }

    fn schedule_flush(&self) -> Result<()> {
        match &self.flush_tx {
            Some(tx) => tx.send(FlushTask::Flush).map_err(|_| Error::Closed),
            None => self.inner.flush_pending(),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl Drop for DB {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
