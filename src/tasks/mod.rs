//! Background Tasks Module
//!
//! Contains the work that runs off the caller's path.
//!
//! # Tasks
//! - I/O lane: Executes disk writes, deletes and maintenance passes serially
//! - Maintenance: Checkpoints the index and sweeps expired and excess entries

mod io_lane;
mod maintenance;

pub(crate) use io_lane::{IoLane, Job};
pub(crate) use maintenance::PeriodicMaintenance;
pub use maintenance::{MaintenanceReport, MaintenanceScheduler, MaintenanceTrigger, SchedulerState};
