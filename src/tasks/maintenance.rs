//! Maintenance Scheduler
//!
//! Runs index checkpoints and eviction sweeps periodically and on lifecycle
//! events, with at most one pass in flight.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::tasks::{IoLane, Job};

/// Why a maintenance pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceTrigger {
    /// Timer tick
    Periodic,
    /// Storage running low
    LowStorage,
    /// Host application moved to the background
    Background,
    /// Orderly shutdown
    Shutdown,
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub trigger: MaintenanceTrigger,
    /// Whether the index was written
    pub checkpointed: bool,
    pub expired: usize,
    pub evicted: usize,
    pub index_failures: usize,
    pub usage_after: u64,
}

/// Returns the scheduler to Idle when a pass ends, however it ends.
struct RunGuard {
    state: Arc<watch::Sender<SchedulerState>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.send_replace(SchedulerState::Idle);
    }
}

// == Maintenance Scheduler ==
/// Idle/Running state machine in front of the cache's maintenance pass.
///
/// Triggers arriving while a pass is running are dropped, except shutdown,
/// which waits for the running pass and then performs its own.
#[derive(Debug, Clone)]
pub struct MaintenanceScheduler {
    lane: IoLane,
    state: Arc<watch::Sender<SchedulerState>>,
}

impl MaintenanceScheduler {
    // == Constructor ==
    pub(crate) fn new(lane: IoLane) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            lane,
            state: Arc::new(state),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Moves Idle to Running. Returns None if a pass is already running.
    fn try_begin(&self) -> Option<RunGuard> {
        let started = self.state.send_if_modified(|state| {
            if *state == SchedulerState::Idle {
                *state = SchedulerState::Running;
                true
            } else {
                false
            }
        });
        started.then(|| RunGuard {
            state: Arc::clone(&self.state),
        })
    }

    /// Queues one pass on the I/O lane and waits for its report.
    async fn pass(&self, trigger: MaintenanceTrigger) -> Option<MaintenanceReport> {
        let (reply, done) = oneshot::channel();
        if !self.lane.submit(Job::Maintenance { trigger, reply }) {
            return None;
        }
        done.await.ok()
    }

    // == Run ==
    /// Runs a pass and waits for it.
    ///
    /// Returns None if the trigger was coalesced into a running pass or the
    /// cache's I/O lane is gone.
    pub async fn run(&self, trigger: MaintenanceTrigger) -> Option<MaintenanceReport> {
        let Some(_guard) = self.try_begin() else {
            debug!("Maintenance already running, dropping {:?} trigger", trigger);
            return None;
        };
        self.pass(trigger).await
    }

    // == Trigger ==
    /// Starts a pass in the background.
    ///
    /// Returns false if a pass is already running. Must be called from
    /// within a Tokio runtime.
    pub fn trigger(&self, trigger: MaintenanceTrigger) -> bool {
        let Some(guard) = self.try_begin() else {
            debug!("Maintenance already running, dropping {:?} trigger", trigger);
            return false;
        };
        let scheduler = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Some(report) = scheduler.pass(trigger).await {
                log_report(&report);
            }
        });
        true
    }

    // == Shutdown ==
    /// Runs the final pass, waiting out any pass already in flight.
    pub async fn shutdown(&self) -> Option<MaintenanceReport> {
        let mut state = self.state.subscribe();
        loop {
            if let Some(_guard) = self.try_begin() {
                let report = self.pass(MaintenanceTrigger::Shutdown).await;
                if let Some(report) = &report {
                    log_report(report);
                }
                return report;
            }
            // Sender lives in self, so this only returns once Idle is seen
            let _ = state.wait_for(|s| *s == SchedulerState::Idle).await;
        }
    }
}

fn log_report(report: &MaintenanceReport) {
    if report.expired > 0 || report.evicted > 0 {
        info!(
            "Maintenance ({:?}): expired {}, evicted {}, usage now {} bytes",
            report.trigger, report.expired, report.evicted, report.usage_after
        );
    } else {
        debug!(
            "Maintenance ({:?}): nothing to remove, checkpointed={}",
            report.trigger, report.checkpointed
        );
    }
}

// == Periodic Maintenance ==
/// The timer-driven side of a cache's scheduler.
///
/// Owned by the cache facade; the periodic task is aborted when this is
/// dropped or stopped.
#[derive(Debug)]
pub(crate) struct PeriodicMaintenance {
    scheduler: MaintenanceScheduler,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicMaintenance {
    /// Starts a pass every `interval` on the given runtime.
    pub(crate) fn start(
        scheduler: MaintenanceScheduler,
        interval: Duration,
        handle: &Handle,
    ) -> Self {
        let task = spawn_maintenance_task(scheduler.clone(), interval, handle);
        Self {
            scheduler,
            task: Mutex::new(Some(task)),
        }
    }

    pub(crate) fn scheduler(&self) -> &MaintenanceScheduler {
        &self.scheduler
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stops the periodic task. A pass already queued on the lane still runs.
    pub(crate) fn stop(&self) {
        if let Some(task) = self.task().take() {
            task.abort();
            debug!("Periodic cache maintenance stopped");
        }
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self) -> bool {
        self.task().as_ref().is_some_and(|task| !task.is_finished())
    }

    #[cfg(test)]
    pub(crate) fn abort_handle(&self) -> Option<tokio::task::AbortHandle> {
        self.task().as_ref().map(JoinHandle::abort_handle)
    }
}

impl Drop for PeriodicMaintenance {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns a background task that runs a maintenance pass every interval.
///
/// # Arguments
/// * `scheduler` - Scheduler shared with lifecycle-event triggers
/// * `interval` - Time between passes
/// * `handle` - Runtime hosting the task
///
/// # Returns
/// A JoinHandle for the spawned task, aborted by [`PeriodicMaintenance`].
fn spawn_maintenance_task(
    scheduler: MaintenanceScheduler,
    interval: Duration,
    handle: &Handle,
) -> JoinHandle<()> {
    handle.spawn(async move {
        info!(
            "Starting cache maintenance task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            if let Some(report) = scheduler.run(MaintenanceTrigger::Periodic).await {
                log_report(&report);
            }
        }
    })
}
