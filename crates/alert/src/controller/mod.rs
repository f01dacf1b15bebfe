//! Job controller: owns the set of running alert jobs.
//!
//! Each active job has exactly one scheduling task. A task polls its
//! schedule every tick and, on each fire, spawns an independent pipeline run
//! that it never awaits. Start, Stop and Reload serialize on the registry
//! lock, and Stop returns only after the task has exited, so a name never has
//! two live generations.

mod core;
mod recovery;
mod task;


use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schedule::ScheduleError;
use crate::store::StoreError;

pub use self::core::JobController;
pub use self::recovery::RecoverReport;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("job {0} is already active")]
    AlreadyActive(String),

    #[error("job {0} is not active")]
    NotActive(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Point-in-time view of a running job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub name: String,
    pub title: String,
    pub generation: u64,
    pub schedule: String,
    pub started_at: DateTime<Utc>,
    pub next_fire: Option<DateTime<Utc>>,
}
