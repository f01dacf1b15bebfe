//! Control API handlers.

mod watcher;

#[cfg(test)]
mod tests;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

pub use watcher::{watcher_list, watcher_reload, watcher_stop};

// ── Shared types ─────────────────────────────────────────────────

/// Body of every `/watcher/{id}` response.
#[derive(Debug, Serialize)]
pub struct MsgResponse {
    pub msg: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub type ApiResponse = (StatusCode, Json<MsgResponse>);

pub(crate) fn ok(msg: &'static str) -> ApiResponse {
    (StatusCode::OK, Json(MsgResponse { msg, error: None }))
}

pub(crate) fn fail(status: StatusCode, msg: &'static str, error: impl ToString) -> ApiResponse {
    (
        status,
        Json(MsgResponse {
            msg,
            error: Some(error.to_string()),
        }),
    )
}

// ── Liveness ─────────────────────────────────────────────────────

pub async fn service_available() -> &'static str {
    "Service Available"
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
