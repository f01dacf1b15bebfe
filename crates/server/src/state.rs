use std::sync::Arc;

use vigil_alert::{JobController, JobStore};

/// Shared state handed to every request handler.
pub struct AppState {
    pub controller: Arc<JobController>,
    pub store: Arc<dyn JobStore>,
}
