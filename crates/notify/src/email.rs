//! HTML e-mail action and the SMTP relay behind it.
//!
//! [`MailAction`] talks to a [`Mailer`], so tests can substitute a recorder
//! for the `lettre` transport used in production ([`SmtpMailer`]).

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use vigil_core::config::MailConfig;
use vigil_core::ExecutionContext;

use crate::error::{ActionError, ActionKind};
use crate::registry::ActionEnv;

/// Delivery seam for the mail action.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    /// Send one HTML message to every recipient.
    async fn send_html(
        &self,
        recipients: &[String],
        subject: &str,
        html: &str,
    ) -> Result<(), ActionError>;
}

#[derive(Debug, Deserialize)]
pub(crate) struct MailFields {
    #[serde(alias = "to", deserialize_with = "crate::recipients::deserialize")]
    recipients: Vec<String>,
    subject: String,
    content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailAction {
    pub recipients: Vec<String>,
    pub subject: String,
    pub content: String,
}

impl MailAction {
    pub(crate) fn from_fields(fields: MailFields) -> Result<Self, ActionError> {
        if fields.recipients.is_empty() {
            return Err(ActionError::Invalid {
                action: ActionKind::Mail,
                field: "recipients",
                reason: "at least one recipient is required".to_string(),
            });
        }
        for addr in &fields.recipients {
            addr.parse::<Mailbox>().map_err(|e| ActionError::Invalid {
                action: ActionKind::Mail,
                field: "recipients",
                reason: format!("{addr:?}: {e}"),
            })?;
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
        let mailer = env.mailer.as_ref().ok_or_else(|| ActionError::NotConfigured {
            action: ActionKind::Mail,
            reason: "no mail relay configured (MAIL_HOST)".to_string(),
        })?;

        mailer
            .send_html(&self.recipients, &self.subject, &self.content)
            .await?;

        tracing::info!(
            job = %ctx.job_name,
            action = "mail",
            subject = %self.subject,
            recipients = self.recipients.len(),
            "mail delivered"
        );
        Ok(())
    }
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlsMode {
    /// TLS from the first byte (SMTPS, port 465).
    Implicit,
    /// Plain connect upgraded with STARTTLS.
    StartTls,
    Plain,
}

impl TlsMode {
    fn for_config(config: &MailConfig) -> Self {
        if config.port == 465 {
            TlsMode::Implicit
        } else if config.tls {
            TlsMode::StartTls
        } else {
            TlsMode::Plain
        }
    }
}

/// Sends mail through an SMTP relay via `lettre`.
#[derive(Debug)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build from the `mail` config section.
    ///
    /// Port 465 uses implicit TLS, `MAIL_TLS=true` on any other port uses
    /// STARTTLS, and anything else is plain SMTP (the common internal relay on
    /// port 25). Credentials are attached only when both username and
    /// password are set.
    pub fn from_config(config: &MailConfig) -> Result<Self, ActionError> {
        let host = config.host.as_deref().ok_or_else(|| not_configured("MAIL_HOST is not set"))?;

        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                not_configured(&format!("invalid MAIL_FROM {:?}: {e}", config.from))
            })?;

        let mut builder = match TlsMode::for_config(config) {
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| not_configured(&e.to_string()))?
                .port(config.port),
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| not_configured(&e.to_string()))?
                .port(config.port),
            TlsMode::Plain => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(config.port)
            }
        };

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send_html(
        &self,
        recipients: &[String],
        subject: &str,
        html: &str,
    ) -> Result<(), ActionError> {
        let mut builder = Message::builder().from(self.from.clone());
        for addr in recipients {
            let mailbox: Mailbox = addr
                .parse()
                .map_err(|e: lettre::address::AddressError| ActionError::Smtp(e.to_string()))?;
            builder = builder.to(mailbox);
        }

        let email = builder
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| ActionError::Smtp(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| ActionError::Smtp(e.to_string()))?;
        Ok(())
    }
}

fn not_configured(reason: &str) -> ActionError {
    ActionError::NotConfigured {
        action: ActionKind::Mail,
        reason: reason.to_string(),
    }
}
