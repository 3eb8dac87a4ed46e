//! Best-effort outbound email.
//!
//! # Responsibility
//! - Render notification emails and hand them to a transport backend.
//!
//! # Invariants
//! - Email never participates in a store transaction; callers send only
//!   after commit.
//! - Transport and rendering failures stop at `EmailDispatcher`, which logs
//!   them and reports `false`.

use thiserror::Error;

mod backend;
mod dispatcher;
pub mod templates;

pub use backend::{LogBackend, MemoryBackend, SmtpBackend};
pub use dispatcher::EmailDispatcher;
pub use templates::{BuiltinTemplates, TemplateContext, TemplateError, TemplateId, TemplateRenderer};

/// One rendered HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("invalid address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Transport seam; implementations deliver or fail, never retry.
pub trait EmailBackend: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;

    /// Short label used in log events.
    fn name(&self) -> &'static str;
}
