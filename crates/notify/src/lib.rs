//! Notification actions for alert runs.
//!
//! This crate provides:
//! - `ActionRegistry`, which decodes action descriptions into handlers
//! - Log, HTTP, mail, and webhook-broadcast handlers
//! - `Mailer` seam with an SMTP implementation via `lettre`

pub mod broadcast;
pub mod email;
pub mod error;
pub mod http;
pub mod log;
mod recipients;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use email::{Mailer, SmtpMailer};
pub use error::{ActionError, ActionKind};
pub use registry::{Action, ActionEnv, ActionHandler, ActionRegistry};
