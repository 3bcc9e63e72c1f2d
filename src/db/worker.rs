//! Background flush thread.
//!
//! The worker owns no state of its own: a `Flush` message only tells it to
//! drain whatever frozen memtables the engine currently holds. A failed
//! flush leaves its memtable frozen (and readable), is retried on the next
//! message, and is kept for `wait_idle` or `close` to return.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error};

use super::DbInner;
use crate::error::Result;

pub(crate) enum FlushTask {
    Flush,
    /// Acknowledged once every earlier task has been handled.
    Barrier(Sender<()>),
    Shutdown,
}

pub(crate) fn spawn(inner: Arc<DbInner>, rx: Receiver<FlushTask>) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("lsmkv-flush".into())
        .spawn(move || run(&inner, &rx))?;
    Ok(handle)
}

fn run(inner: &DbInner, rx: &Receiver<FlushTask>) {
    for task in rx.iter() {
        match task {
            FlushTask::Flush => {
                if let Err(e) = inner.flush_pending() {
                    error!("background flush failed: {e}");
                    inner.record_flush_error(e);
                }
            }
            FlushTask::Barrier(done) => {
                let _ = done.send(());
            }
            FlushTask::Shutdown => break,
        }
    }
    debug!("flush worker stopped");
}
