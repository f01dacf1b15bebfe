use serde::Serialize;
use tracing::{error, info};

use super::core::terminate;
use super::{ControllerError, JobController};
use crate::definition::JobDefinition;
use crate::store::JobStore;

/// Result of replaying stored jobs at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoverReport {
    pub started: Vec<String>,
    /// `(job name, reason)` for every record that could not be started.
    pub failed: Vec<(String, String)>,
}

impl JobController {
    /// Start every active, non-deleted stored job. Per-job failures are logged
    /// and reported; only a store failure aborts recovery.
    pub async fn recover(&self, store: &dyn JobStore) -> Result<RecoverReport, ControllerError> {
        let records = store.list_active().await?;
        info!(count = records.len(), "recovering alert jobs");

        let mut report = RecoverReport::default();
        for record in &records {
            let name = record.job_name();
            let started = match JobDefinition::from_record(record) {
                Ok(def) => self.start(def).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match started {
                Ok(_) => report.started.push(name),
                Err(reason) => {
                    error!(job = %name, error = %reason, "failed to recover job");
                    report.failed.push((name, reason));
                }
            }
        }

        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "recovery finished"
        );
        Ok(report)
    }

    /// Stop every running job.
    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        let count = jobs.len();
        for (_, job) in jobs.drain() {
            terminate(job).await;
        }
        info!(count, "all jobs stopped");
    }
}
