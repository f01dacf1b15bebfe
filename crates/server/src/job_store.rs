//! PostgreSQL-backed [`JobStore`] over the `alert_job` table.

use sqlx::PgPool;

use vigil_alert::{JobStore, StoreError};
use vigil_core::JobRecord;

#[derive(Debug, sqlx::FromRow)]
struct AlertJobRow {
    id: i64,
    user_id: String,
    name: String,
    value: String,
    status: i32,
    is_deleted: i32,
}

impl From<AlertJobRow> for JobRecord {
    fn from(row: AlertJobRow) -> Self {
        JobRecord {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            value: row.value,
            status: row.status,
            is_deleted: row.is_deleted,
        }
    }
}

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ── JobStore ──────────────────────────────────────────────────

#[async_trait::async_trait]
impl JobStore for PgJobStore {
    async fn get(&self, id: i64) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query_as::<_, AlertJobRow>(
            "SELECT id, user_id, name, value, status, is_deleted \
             FROM alert_job WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(JobRecord::from))
    }

    async fn list_active(&self) -> Result<Vec<JobRecord>, StoreError> {
        let rows = sqlx::query_as::<_, AlertJobRow>(
            "SELECT id, user_id, name, value, status, is_deleted \
             FROM alert_job WHERE status = 1 AND is_deleted = 0 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(rows.into_iter().map(JobRecord::from).collect())
    }
}
