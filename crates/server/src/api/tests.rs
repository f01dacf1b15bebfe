use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use vigil_alert::{
    JobController, JobStore, MemoryJobStore, PipelineDeps, SearchBackend, SearchError,
    StoreError, TemplateDecisionEngine,
};
use vigil_core::{JobRecord, SearchResult};
use vigil_notify::{ActionEnv, ActionRegistry};

use crate::router::build_router;
use crate::state::AppState;

struct EmptySearch;

#[async_trait::async_trait]
impl SearchBackend for EmptySearch {
    async fn search(&self, _endpoint: &str, _body: &Value) -> Result<SearchResult, SearchError> {
        Ok(SearchResult::default())
    }
}

struct DownStore;

#[async_trait::async_trait]
impl JobStore for DownStore {
    async fn get(&self, _id: i64) -> Result<Option<JobRecord>, StoreError> {
        Err(StoreError::backend(std::io::Error::other("connection refused")))
    }

    async fn list_active(&self) -> Result<Vec<JobRecord>, StoreError> {
        Err(StoreError::backend(std::io::Error::other("connection refused")))
    }
}

const HOURLY: &str = r#"
interval: "@every 1h"
search_url: /logs-*/_search
search:
  query: { match_all: {} }
process: "[]"
"#;

fn record(id: i64, value: &str, status: i32, is_deleted: i32) -> JobRecord {
    JobRecord {
        id,
        user_id: "ops".into(),
        name: format!("job {id}"),
        value: value.into(),
        status,
        is_deleted,
    }
}

struct Harness {
    app: Router,
    controller: Arc<JobController>,
    store: Arc<MemoryJobStore>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryJobStore::new());
        let harness_store: Arc<dyn JobStore> = store.clone();
        Self::with_store(harness_store, store)
    }

    fn with_store(store: Arc<dyn JobStore>, memory: Arc<MemoryJobStore>) -> Self {
        let deps = PipelineDeps::new(
            Arc::new(EmptySearch),
            Arc::new(TemplateDecisionEngine::new()),
            ActionRegistry::new(ActionEnv::new(reqwest::Client::new())),
        );
        let controller = Arc::new(JobController::new(Arc::new(deps), Duration::from_millis(10)));
        let state = Arc::new(AppState {
            controller: controller.clone(),
            store,
        });
        Self {
            app: build_router(state, "*"),
            controller,
            store: memory,
        }
    }

    async fn call(&self, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }
}

// ── Liveness ─────────────────────────────────────────────────────

#[tokio::test]
async fn root_reports_service_available() {
    let h = Harness::new();
    let (status, body) = h.call(Method::GET, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Service Available");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let h = Harness::new();
    let (status, body) = h.call(Method::GET, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not Found");
}

// ── POST /watcher/{id} ───────────────────────────────────────────

#[tokio::test]
async fn reload_starts_active_record() {
    let h = Harness::new();
    h.store.upsert(record(42, HOURLY, 1, 0));

    let (status, body) = h.call(Method::POST, "/watcher/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "reload ok");
    assert!(body.get("error").is_none());
    assert!(h.controller.is_active("42").await);

    let (_, list) = h.call(Method::GET, "/watcher").await;
    assert_eq!(list["list"], serde_json::json!(["42"]));
    assert_eq!(list["jobs"][0]["title"], "job 42");
    assert_eq!(list["jobs"][0]["schedule"], "@every 1h");
}

#[tokio::test]
async fn reload_twice_keeps_one_job() {
    let h = Harness::new();
    h.store.upsert(record(42, HOURLY, 1, 0));

    h.call(Method::POST, "/watcher/42").await;
    let first = h.controller.list().await[0].generation;
    h.call(Method::POST, "/watcher/42").await;

    let jobs = h.controller.list().await;
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].generation > first);
}

#[tokio::test]
async fn reload_missing_record_is_not_found() {
    let h = Harness::new();
    let (status, body) = h.call(Method::POST, "/watcher/7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "record not found");
}

#[tokio::test]
async fn reload_malformed_definition_is_not_acceptable() {
    let h = Harness::new();
    h.store.upsert(record(5, "interval: \"@every 1h\"\n", 1, 0));

    let (status, body) = h.call(Method::POST, "/watcher/5").await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["msg"], "definition invalid");
    assert!(body["error"].as_str().unwrap().contains("search"), "got: {body}");
    assert!(!h.controller.is_active("5").await);
}

#[tokio::test]
async fn reload_bad_schedule_is_unprocessable() {
    let h = Harness::new();
    h.store.upsert(record(6, &HOURLY.replace("@every 1h", "61 * * * *"), 1, 0));

    let (status, body) = h.call(Method::POST, "/watcher/6").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["msg"], "schedule invalid");
    assert!(!h.controller.is_active("6").await);
}

#[tokio::test]
async fn reload_disabled_record_stops_running_job() {
    let h = Harness::new();
    h.store.upsert(record(42, HOURLY, 1, 0));
    h.call(Method::POST, "/watcher/42").await;

    h.store.upsert(record(42, HOURLY, 0, 0));
    let (status, body) = h.call(Method::POST, "/watcher/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "stop ok");
    assert!(!h.controller.is_active("42").await);

    let (status, body) = h.call(Method::POST, "/watcher/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "not running");
}

#[tokio::test]
async fn store_failure_is_internal_error() {
    let h = Harness::with_store(Arc::new(DownStore), Arc::new(MemoryJobStore::new()));
    let (status, body) = h.call(Method::POST, "/watcher/1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["msg"], "store error");
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn non_numeric_id_is_rejected() {
    let h = Harness::new();
    let (status, _) = h.call(Method::POST, "/watcher/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── DELETE /watcher/{id} ─────────────────────────────────────────

#[tokio::test]
async fn stop_refuses_active_record() {
    let h = Harness::new();
    h.store.upsert(record(42, HOURLY, 1, 0));
    h.call(Method::POST, "/watcher/42").await;

    let (status, body) = h.call(Method::DELETE, "/watcher/42").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["msg"], "still active");
    assert!(h.controller.is_active("42").await);
}

#[tokio::test]
async fn stop_deleted_record_stops_job() {
    let h = Harness::new();
    h.store.upsert(record(42, HOURLY, 1, 0));
    h.call(Method::POST, "/watcher/42").await;
    h.store.upsert(record(42, HOURLY, 1, 1));

    let (status, body) = h.call(Method::DELETE, "/watcher/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "stop ok");
    assert!(!h.controller.is_active("42").await);

    let (status, body) = h.call(Method::DELETE, "/watcher/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "not running");
}

#[tokio::test]
async fn stop_missing_record_is_not_found() {
    let h = Harness::new();
    let (status, body) = h.call(Method::DELETE, "/watcher/9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "record not found");
}

// ── GET /watcher ─────────────────────────────────────────────────

#[tokio::test]
async fn list_is_empty_initially() {
    let h = Harness::new();
    let (status, body) = h.call(Method::GET, "/watcher").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"list": [], "jobs": []}));
}
