//! Action kinds and the shared action error type.

use std::fmt;

use serde::Serialize;

/// The closed set of action variants a decision step may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Log,
    Http,
    Mail,
    WebhookBroadcast,
}

impl ActionKind {
    /// Canonical `type` discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Log => "log",
            ActionKind::Http => "http",
            ActionKind::Mail => "mail",
            ActionKind::WebhookBroadcast => "webhook_broadcast",
        }
    }

    /// Resolve a `type` discriminator, case-insensitively and including aliases.
    pub fn from_type(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "log" => Some(ActionKind::Log),
            "http" => Some(ActionKind::Http),
            "mail" | "email" => Some(ActionKind::Mail),
            "webhook_broadcast" | "broadcast" | "wechat" => Some(ActionKind::WebhookBroadcast),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while decoding or executing an action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("action description is not an object")]
    NotAnObject,

    #[error("action description has no string `type` field")]
    MissingType,

    #[error("unknown action type: {0}")]
    UnknownType(String),

    #[error("{action} action: {reason}")]
    Decode { action: ActionKind, reason: String },

    #[error("{action} action: invalid `{field}`: {reason}")]
    Invalid {
        action: ActionKind,
        field: &'static str,
        reason: String,
    },

    #[error("action #{index}: {source}")]
    AtIndex {
        index: usize,
        #[source]
        source: Box<ActionError>,
    },

    #[error("{action} request failed: {source}")]
    Http {
        action: ActionKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("{action} endpoint returned {status}: {body}")]
    Status {
        action: ActionKind,
        status: u16,
        body: String,
    },

    #[error("mail delivery failed: {0}")]
    Smtp(String),

    #[error("{action} action is not configured: {reason}")]
    NotConfigured { action: ActionKind, reason: String },
}

impl ActionError {
    /// Variant the error belongs to, when it can be attributed to one.
    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            ActionError::Decode { action, .. }
            | ActionError::Invalid { action, .. }
            | ActionError::Http { action, .. }
            | ActionError::Status { action, .. }
            | ActionError::NotConfigured { action, .. } => Some(*action),
            ActionError::Smtp(_) => Some(ActionKind::Mail),
            ActionError::AtIndex { source, .. } => source.kind(),
            ActionError::NotAnObject | ActionError::MissingType | ActionError::UnknownType(_) => {
                None
            }
        }
    }
}
