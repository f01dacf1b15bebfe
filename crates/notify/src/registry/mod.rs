//! Decodes loosely-typed action descriptions into executable handlers.
//!
//! A decision step produces JSON objects such as
//! `{"type": "http", "method": "POST", "url": "https://..."}`. The registry
//! resolves the `type` discriminator, decodes the remaining fields into the
//! variant's typed shape, validates them, and binds the result to the shared
//! [`ActionEnv`] so it can be executed.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use vigil_core::{Config, ExecutionContext};

use crate::broadcast::BroadcastAction;
use crate::email::{MailAction, Mailer, SmtpMailer};
use crate::error::{ActionError, ActionKind};
use crate::http::HttpAction;
use crate::log::LogAction;

/// Collaborators shared by every handler: one HTTP client, the optional
/// mail relay, and the optional broadcast endpoint.
#[derive(Clone)]
pub struct ActionEnv {
    pub(crate) client: reqwest::Client,
    pub(crate) mailer: Option<Arc<dyn Mailer>>,
    pub(crate) broadcast_url: Option<reqwest::Url>,
}

impl ActionEnv {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            mailer: None,
            broadcast_url: None,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_broadcast_url(mut self, url: reqwest::Url) -> Self {
        self.broadcast_url = Some(url);
        self
    }

    /// Build the environment from process configuration.
    ///
    /// The HTTP client gets the configured action timeout. Mail and broadcast
    /// stay unconfigured when their settings are absent; actions of those
    /// kinds then fail at execution with [`ActionError::NotConfigured`].
    pub fn from_config(config: &Config) -> Result<Self, ActionError> {
        let client = reqwest::Client::builder()
            .timeout(config.scheduler.action_timeout())
            .build()
            .map_err(|source| ActionError::Http {
                action: ActionKind::Http,
                source,
            })?;

        let mut env = Self::new(client);

        if config.mail.is_configured() {
            let mailer = SmtpMailer::from_config(&config.mail)?;
            env = env.with_mailer(Arc::new(mailer));
        }

        if let Some(raw) = &config.broadcast.url {
            let url = reqwest::Url::parse(raw).map_err(|e| ActionError::NotConfigured {
                action: ActionKind::WebhookBroadcast,
                reason: format!("invalid BROADCAST_URL {raw:?}: {e}"),
            })?;
            env = env.with_broadcast_url(url);
        }

        Ok(env)
    }
}

impl std::fmt::Debug for ActionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEnv")
            .field("mailer", &self.mailer.is_some())
            .field("broadcast_url", &self.broadcast_url.as_ref().map(|u| u.as_str()))
            .finish()
    }
}

/// Decoded, validated action payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Log(LogAction),
    Http(HttpAction),
    Mail(MailAction),
    WebhookBroadcast(BroadcastAction),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Log(_) => ActionKind::Log,
            Action::Http(_) => ActionKind::Http,
            Action::Mail(_) => ActionKind::Mail,
            Action::WebhookBroadcast(_) => ActionKind::WebhookBroadcast,
        }
    }
}

/// An executable action bound to its environment.
#[derive(Debug, Clone)]
pub struct ActionHandler {
    action: Action,
    env: Arc<ActionEnv>,
}

impl ActionHandler {
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Perform the side effect once. Handlers never retry.
    pub async fn execute(&self, ctx: &ExecutionContext) -> Result<(), ActionError> {
        let start = Instant::now();
        let result = match &self.action {
            Action::Log(a) => {
                a.execute(ctx);
                Ok(())
            }
            Action::Http(a) => a.execute(ctx, &self.env).await,
            Action::Mail(a) => a.execute(ctx, &self.env).await,
            Action::WebhookBroadcast(a) => a.execute(ctx, &self.env).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => tracing::debug!(
                job = %ctx.job_name,
                action = %self.kind(),
                duration_ms,
                "action executed"
            ),
            Err(e) => tracing::warn!(
                job = %ctx.job_name,
                action = %self.kind(),
                duration_ms,
                error = %e,
                "action failed"
            ),
        }
        result
    }
}

/// Turns action descriptions into handlers.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    env: Arc<ActionEnv>,
}

impl ActionRegistry {
    pub fn new(env: ActionEnv) -> Self {
        Self { env: Arc::new(env) }
    }

    /// Decode a single action description.
    pub fn parse(&self, raw: &Value) -> Result<ActionHandler, ActionError> {
        let action = decode_action(raw)?;
        Ok(ActionHandler {
            action,
            env: self.env.clone(),
        })
    }

    /// Decode an ordered list. All-or-nothing: the first failure is returned
    /// with its index and no handlers are produced.
    pub fn parse_batch(&self, raws: &[Value]) -> Result<Vec<ActionHandler>, ActionError> {
        raws.iter()
            .enumerate()
            .map(|(index, raw)| {
                self.parse(raw).map_err(|e| ActionError::AtIndex {
                    index,
                    source: Box::new(e),
                })
            })
            .collect()
    }
}

fn decode_action(raw: &Value) -> Result<Action, ActionError> {
    let Value::Object(map) = raw else {
        return Err(ActionError::NotAnObject);
    };
    let mut fields = map.clone();
    let kind = match fields.remove("type") {
        Some(Value::String(t)) => {
            ActionKind::from_type(&t).ok_or(ActionError::UnknownType(t))?
        }
        _ => return Err(ActionError::MissingType),
    };

    let action = match kind {
        ActionKind::Log => Action::Log(decode_fields(kind, fields)?),
        ActionKind::Http => Action::Http(HttpAction::from_fields(decode_fields(kind, fields)?)?),
        ActionKind::Mail => Action::Mail(MailAction::from_fields(decode_fields(kind, fields)?)?),
        ActionKind::WebhookBroadcast => {
            Action::WebhookBroadcast(BroadcastAction::from_fields(decode_fields(kind, fields)?)?)
        }
    };
    Ok(action)
}

/// Deserialize the non-discriminator fields into a variant's shape.
/// serde's message names the offending field (``missing field `url` ``).
pub(crate) fn decode_fields<T: DeserializeOwned>(
    action: ActionKind,
    fields: Map<String, Value>,
) -> Result<T, ActionError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| ActionError::Decode {
        action,
        reason: e.to_string(),
    })
}
