//! I/O Lane
//!
//! A single background worker that executes mutating disk operations in
//! submission order.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::cache::{CacheCore, CacheKey, EntryMetadata};
use crate::error::Result;
use crate::models::CachedResponse;
use crate::tasks::{MaintenanceReport, MaintenanceTrigger};

/// Work items accepted by the lane.
#[derive(Debug)]
pub(crate) enum Job {
    /// Encode, write and index a response
    Write {
        key: CacheKey,
        response: Box<CachedResponse>,
    },
    /// Remove a key from index and disk
    Delete { key: CacheKey },
    /// Delete a file a reader found unusable, unless it was rewritten since
    EvictStale { key: CacheKey, seen: EntryMetadata },
    /// Remove everything
    Purge,
    /// Persist the index if dirty
    Checkpoint { reply: oneshot::Sender<Result<bool>> },
    /// Checkpoint and sweep
    Maintenance {
        trigger: MaintenanceTrigger,
        reply: oneshot::Sender<MaintenanceReport>,
    },
    /// Barrier: replies once all earlier jobs have run
    Flush { reply: oneshot::Sender<()> },
}

// == I/O Lane ==
/// Handle for submitting jobs to the lane.
///
/// The worker exits once every handle is dropped and the queue drains.
#[derive(Debug, Clone)]
pub(crate) struct IoLane {
    tx: mpsc::UnboundedSender<Job>,
}

impl IoLane {
    // == Spawn ==
    /// Starts the worker on the given runtime.
    pub(crate) fn spawn(core: Arc<CacheCore>, handle: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run_lane(core, rx));
        Self { tx }
    }

    // == Submit ==
    /// Queues a job. Returns false if the worker has stopped.
    pub(crate) fn submit(&self, job: Job) -> bool {
        match self.tx.send(job) {
            Ok(()) => true,
            Err(_) => {
                warn!("I/O lane is closed, dropping job");
                false
            }
        }
    }
}

async fn run_lane(core: Arc<CacheCore>, mut rx: mpsc::UnboundedReceiver<Job>) {
    debug!("I/O lane started");

    while let Some(job) = rx.recv().await {
        let core = Arc::clone(&core);
        // Awaiting each job before taking the next keeps execution serial
        if let Err(e) = tokio::task::spawn_blocking(move || execute(&core, job)).await {
            error!("I/O lane job failed: {}", e);
        }
    }

    debug!("I/O lane stopped");
}

fn execute(core: &CacheCore, job: Job) {
    match job {
        Job::Write { key, response } => core.write_entry(key, &response),
        Job::Delete { key } => core.delete_entry(&key),
        Job::EvictStale { key, seen } => core.evict_stale(&key, &seen),
        Job::Purge => core.purge(),
        Job::Checkpoint { reply } => {
            let _ = reply.send(core.checkpoint());
        }
        Job::Maintenance { trigger, reply } => {
            let report = core.maintain(trigger);
            let _ = reply.send(report);
        }
        Job::Flush { reply } => {
            let _ = reply.send(());
        }
    }
}
