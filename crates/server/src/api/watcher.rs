//! `/watcher` endpoints: reload, stop and list alert jobs.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use vigil_alert::{ControllerError, JobDefinition, JobSummary};
use vigil_core::JobRecord;

use super::{fail, ok, ApiResponse};
use crate::state::AppState;

async fn load_record(state: &AppState, id: i64) -> Result<JobRecord, ApiResponse> {
    match state.store.get(id).await {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(fail(
            StatusCode::NOT_FOUND,
            "record not found",
            format!("no alert_job with id {id}"),
        )),
        Err(e) => {
            warn!(id, error = %e, "job store lookup failed");
            Err(fail(StatusCode::INTERNAL_SERVER_ERROR, "store error", e))
        }
    }
}

/// `POST /watcher/{id}` brings the running job in line with its stored record.
///
/// An active record is started, or restarted under a new generation if it
/// was already running. An inactive or deleted record is stopped if running.
pub async fn watcher_reload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResponse {
    let record = match load_record(&state, id).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let name = record.job_name();

    if !record.is_active() {
        return match state.controller.stop(&name).await {
            Ok(()) => {
                info!(job = %name, "stopped inactive job");
                ok("stop ok")
            }
            Err(ControllerError::NotActive(_)) => ok("not running"),
            Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, "stop failed", e),
        };
    }

    let definition = match JobDefinition::from_record(&record) {
        Ok(def) => def,
        Err(e) => {
            warn!(job = %name, error = %e, "rejected job definition");
            return fail(StatusCode::NOT_ACCEPTABLE, "definition invalid", e);
        }
    };

    match state.controller.reload(definition).await {
        Ok(generation) => {
            info!(job = %name, generation, "job reloaded");
            ok("reload ok")
        }
        Err(ControllerError::Schedule(e)) => {
            warn!(job = %name, error = %e, "rejected job schedule");
            fail(StatusCode::UNPROCESSABLE_ENTITY, "schedule invalid", e)
        }
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, "reload failed", e),
    }
}

/// `DELETE /watcher/{id}` stops a job whose record is already inactive.
pub async fn watcher_stop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResponse {
    let record = match load_record(&state, id).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let name = record.job_name();

    if record.is_active() {
        return fail(
            StatusCode::CONFLICT,
            "still active",
            format!("job {name} must be disabled or deleted before it is stopped"),
        );
    }

    match state.controller.stop(&name).await {
        Ok(()) => {
            info!(job = %name, "job stopped");
            ok("stop ok")
        }
        Err(e @ ControllerError::NotActive(_)) => fail(StatusCode::NOT_FOUND, "not running", e),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, "stop failed", e),
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// Names of all active jobs.
    pub list: Vec<String>,
    pub jobs: Vec<JobSummary>,
}

/// `GET /watcher`
pub async fn watcher_list(State(state): State<Arc<AppState>>) -> Json<ListResponse> {
    let jobs = state.controller.list().await;
    Json(ListResponse {
        list: jobs.iter().map(|j| j.name.clone()).collect(),
        jobs,
    })
}
