use serde::Deserialize;
use vigil_core::ExecutionContext;

/// Writes the message to the process log at INFO.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogAction {
    pub message: String,
}

impl LogAction {
    pub(crate) fn execute(&self, ctx: &ExecutionContext) {
        tracing::info!(job = %ctx.job_name, action = "log", "{}", self.message);
    }
}
