//! Outbound HTTP request action.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use vigil_core::ExecutionContext;

use crate::error::{ActionError, ActionKind};
use crate::registry::ActionEnv;

/// Raw field shape of an `http` action description.
#[derive(Debug, Deserialize)]
pub(crate) struct HttpFields {
    method: String,
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
}

/// Sends one request; succeeds on any 2xx status.
///
/// A string `body` is sent verbatim, any other JSON value is sent as
/// `application/json`. Without a `body` the request carries none.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpAction {
    pub method: reqwest::Method,
    pub url: reqwest::Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl HttpAction {
    pub(crate) fn from_fields(fields: HttpFields) -> Result<Self, ActionError> {
        let method = parse_method(&fields.method)?;
        let url = parse_absolute_url(ActionKind::Http, "url", &fields.url)?;

        let mut headers = HeaderMap::with_capacity(fields.headers.len());
        for (name, value) in &fields.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid_header(name, e))?;
            let value = HeaderValue::from_str(value).map_err(|e| invalid_header(name.as_str(), e))?;
            headers.insert(name, value);
        }

        Ok(Self {
            method,
            url,
            headers,
            body: fields.body,
        })
    }

    pub(crate) async fn execute(
        &self,
        ctx: &ExecutionContext,
        env: &ActionEnv,
    ) -> Result<(), ActionError> {
        let mut request = env
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());

        request = match &self.body {
            Some(Value::String(text)) => request.body(text.clone()),
            Some(other) => request.json(other),
            None => request,
        };

        let response = request.send().await.map_err(|source| ActionError::Http {
            action: ActionKind::Http,
            source,
        })?;
        ensure_success(ActionKind::Http, response).await?;

        tracing::info!(
            job = %ctx.job_name,
            action = "http",
            method = %self.method,
            url = %self.url,
            "http action delivered"
        );
        Ok(())
    }
}

fn parse_method(raw: &str) -> Result<reqwest::Method, ActionError> {
    raw.trim()
        .to_uppercase()
        .parse::<reqwest::Method>()
        .map_err(|_| ActionError::Invalid {
            action: ActionKind::Http,
            field: "method",
            reason: format!("not an HTTP method: {raw:?}"),
        })
}

fn invalid_header(name: &str, e: impl std::fmt::Display) -> ActionError {
    ActionError::Invalid {
        action: ActionKind::Http,
        field: "headers",
        reason: format!("{name}: {e}"),
    }
}

/// Parse an absolute `http`/`https` URL.
pub(crate) fn parse_absolute_url(
    action: ActionKind,
    field: &'static str,
    raw: &str,
) -> Result<reqwest::Url, ActionError> {
    let url = reqwest::Url::parse(raw.trim()).map_err(|e| ActionError::Invalid {
        action,
        field,
        reason: format!("{raw:?}: {e}"),
    })?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ActionError::Invalid {
            action,
            field,
            reason: format!("{raw:?}: expected an absolute http(s) URL"),
        }),
    }
}

/// Map a non-2xx response to [`ActionError::Status`], keeping the body text.
pub(crate) async fn ensure_success(
    action: ActionKind,
    response: reqwest::Response,
) -> Result<(), ActionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(ActionError::Status {
        action,
        status: status.as_u16(),
        body,
    })
}
