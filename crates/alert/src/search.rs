//! Search backend seam and the OpenSearch/Elasticsearch HTTP client.

use serde::Deserialize;
use serde_json::Value;
use vigil_core::config::SearchConfig;
use vigil_core::SearchResult;

/// Abstraction over the search store.
///
/// The pipeline only depends on this trait; [`HttpSearchBackend`] is the
/// implementation wired in by the server.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute a rendered request body against `endpoint`.
    async fn search(&self, endpoint: &str, body: &Value) -> Result<SearchResult, SearchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("cannot resolve search endpoint {endpoint:?}: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable search response: {0}")]
    Decode(String),
}

/// `_search` over HTTP. Relative endpoints (`/logs-*/_search`) are joined to
/// the configured base URL.
#[derive(Debug, Clone)]
pub struct HttpSearchBackend {
    client: reqwest::Client,
    base_url: Option<reqwest::Url>,
    credentials: Option<(String, Option<String>)>,
}

impl HttpSearchBackend {
    pub fn new(client: reqwest::Client, base_url: Option<reqwest::Url>) -> Self {
        Self {
            client,
            base_url,
            credentials: None,
        }
    }

    pub fn with_basic_auth(mut self, username: String, password: Option<String>) -> Self {
        self.credentials = Some((username, password));
        self
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;

        let base_url = match &config.base_url {
            Some(raw) => Some(reqwest::Url::parse(raw).map_err(|e| SearchError::Endpoint {
                endpoint: raw.clone(),
                reason: format!("invalid SEARCH_BASE_URL: {e}"),
            })?),
            None => None,
        };

        let mut backend = Self::new(client, base_url);
        if let Some(username) = &config.username {
            backend = backend.with_basic_auth(username.clone(), config.password.clone());
        }
        Ok(backend)
    }

    pub(crate) fn resolve(&self, endpoint: &str) -> Result<reqwest::Url, SearchError> {
        let endpoint = endpoint.trim();
        let err = |reason: String| SearchError::Endpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        if let Ok(url) = reqwest::Url::parse(endpoint) {
            return match url.scheme() {
                "http" | "https" => Ok(url),
                other => Err(err(format!("unsupported scheme {other:?}"))),
            };
        }

        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| err("relative endpoint and no SEARCH_BASE_URL configured".into()))?;
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        reqwest::Url::parse(&joined).map_err(|e| err(e.to_string()))
    }
}

#[async_trait::async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, endpoint: &str, body: &Value) -> Result<SearchResult, SearchError> {
        let url = self.resolve(endpoint)?;

        let mut request = self.client.post(url.clone()).json(body);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(url = %url, %status, "search returned non-2xx status");
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let result = decode_response(&bytes)?;
        tracing::debug!(
            url = %url,
            total_hits = result.total_hits,
            took_ms = result.took_ms,
            "search completed"
        );
        Ok(result)
    }
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    took: u64,
    hits: RawHits,
    #[serde(default)]
    aggregations: Option<Value>,
}

#[derive(Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<RawTotal>,
    #[serde(default)]
    hits: Vec<Value>,
}

/// `hits.total` is a bare number on older clusters and `{ value, relation }`
/// on newer ones.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Count(u64),
    Object { value: u64 },
}

pub(crate) fn decode_response(bytes: &[u8]) -> Result<SearchResult, SearchError> {
    let raw: RawResponse =
        serde_json::from_slice(bytes).map_err(|e| SearchError::Decode(e.to_string()))?;
    let total_hits = match raw.hits.total {
        Some(RawTotal::Count(n)) | Some(RawTotal::Object { value: n }) => n,
        None => raw.hits.hits.len() as u64,
    };
    Ok(SearchResult {
        total_hits,
        took_ms: raw.took,
        hits: raw.hits.hits,
        aggregations: raw.aggregations,
    })
}
