//! Per-fire execution context shared by the pipeline, decision step, and actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search response reduced to the parts templates and decisions look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Total matching documents (`hits.total` or `hits.total.value`).
    pub total_hits: u64,
    /// Server-side query time in milliseconds.
    pub took_ms: u64,
    /// Raw hit documents (`hits.hits`).
    pub hits: Vec<serde_json::Value>,
    /// Aggregation results, if the query requested any.
    pub aggregations: Option<serde_json::Value>,
}

/// State of a single alert run. Created fresh on every fire and owned by
/// that invocation only.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    /// Populated once the search step succeeds.
    pub search_result: Option<SearchResult>,
}

impl ExecutionContext {
    pub fn new(job_name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            job_name: job_name.into(),
            started_at,
            search_result: None,
        }
    }

    /// Template-facing view of the context.
    ///
    /// Exposes `name`, `started_ts` (unix seconds), `time` (RFC 3339), and
    /// `result` (null until the search step has run).
    pub fn template_value(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.job_name,
            "started_ts": self.started_at.timestamp(),
            "time": self.started_at.to_rfc3339(),
            "result": self.search_result,
        })
    }
}
