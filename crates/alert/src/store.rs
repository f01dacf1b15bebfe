//! Read access to persisted job records.

use vigil_core::JobRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job store unavailable: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

/// Durable job storage. The server implements this over PostgreSQL.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch one record by id, deleted or not.
    async fn get(&self, id: i64) -> Result<Option<JobRecord>, StoreError>;

    /// All records with `status = 1` and `is_deleted = 0`.
    async fn list_active(&self) -> Result<Vec<JobRecord>, StoreError>;
}

/// In-process store keyed by record id. Test double for the PostgreSQL
/// store; enabled for other crates through the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: std::sync::Mutex<std::collections::BTreeMap<i64, JobRecord>>,
}

#[cfg(any(test, feature = "test-util"))]
impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = JobRecord>) -> Self {
        let store = Self::new();
        for r in records {
            store.upsert(r);
        }
        store
    }

    pub fn upsert(&self, record: JobRecord) {
        self.lock().insert(record.id, record);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, std::collections::BTreeMap<i64, JobRecord>> {
        // A poisoned map is still structurally valid.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait::async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: i64) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<JobRecord>, StoreError> {
        Ok(self.lock().values().filter(|r| r.is_active()).cloned().collect())
    }
}
