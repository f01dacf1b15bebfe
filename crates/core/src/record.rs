use serde::{Deserialize, Serialize};

/// A persisted alert job row (`alert_job` table).
///
/// `value` holds the YAML job definition; `status` and `is_deleted` decide
/// whether the job should be running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub value: String,
    pub status: i32,
    pub is_deleted: i32,
}

impl JobRecord {
    /// Enabled in storage and not soft-deleted.
    pub fn is_active(&self) -> bool {
        self.status == 1 && self.is_deleted == 0
    }

    /// Controller-facing job name: the record id as a decimal string.
    pub fn job_name(&self) -> String {
        self.id.to_string()
    }
}
