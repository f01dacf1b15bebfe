//! Form-encoded broadcast to a messaging gateway.
//!
//! The gateway receives `receiver` (comma-joined recipients), `subject` and
//! `content` as `application/x-www-form-urlencoded`.

use serde::Deserialize;
use vigil_core::ExecutionContext;

use crate::error::{ActionError, ActionKind};
use crate::http::ensure_success;
use crate::registry::ActionEnv;

const DEFAULT_SUBJECT: &str = "Warning";

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct BroadcastFields {
    #[serde(alias = "users", deserialize_with = "crate::recipients::deserialize")]
    recipients: Vec<String>,
    content: String,
    #[serde(default = "default_subject")]
    subject: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastAction {
    pub recipients: Vec<String>,
    pub subject: String,
    pub content: String,
}

impl BroadcastAction {
    pub(crate) fn from_fields(fields: BroadcastFields) -> Result<Self, ActionError> {
        if fields.recipients.is_empty() {
            return Err(ActionError::Invalid {
                action: ActionKind::WebhookBroadcast,
                field: "recipients",
                reason: "at least one recipient is required".to_string(),
            });
        }
        Ok(Self {
            recipients: fields.recipients,
            subject: fields.subject,
            content: fields.content,
        })
    }

    pub(crate) async fn execute(
        &self,
        ctx: &ExecutionContext,
        env: &ActionEnv,
    ) -> Result<(), ActionError> {
        let url = env.broadcast_url.as_ref().ok_or_else(|| ActionError::NotConfigured {
            action: ActionKind::WebhookBroadcast,
            reason: "no broadcast endpoint configured (BROADCAST_URL)".to_string(),
        })?;

        let receiver = self.recipients.join(",");
        let form = [
            ("receiver", receiver.as_str()),
            ("subject", self.subject.as_str()),
            ("content", self.content.as_str()),
        ];

        let response = env
            .client
            .post(url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|source| ActionError::Http {
                action: ActionKind::WebhookBroadcast,
                source,
            })?;
        ensure_success(ActionKind::WebhookBroadcast, response).await?;

        tracing::info!(
            job = %ctx.job_name,
            action = "webhook_broadcast",
            receiver = %receiver,
            "broadcast delivered"
        );
        Ok(())
    }
}
