//! Email transport backends.

use crate::config::MailSettings;
use crate::mail::{EmailBackend, EmailError, EmailMessage};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::info;
use std::sync::{Arc, Mutex, MutexGuard};

/// Synchronous SMTP delivery through `lettre`.
pub struct SmtpBackend {
    transport: SmtpTransport,
    default_sender: Option<String>,
}

impl SmtpBackend {
    /// Builds a transport from mail settings.
    ///
    /// `use_ssl` selects implicit TLS, `use_tls` selects STARTTLS, and
    /// neither selects a plaintext connection.
    pub fn from_settings(settings: &MailSettings) -> Result<Self, EmailError> {
        let builder = if settings.use_ssl {
            SmtpTransport::relay(&settings.server)
                .map_err(|err| EmailError::Transport(err.to_string()))?
        } else if settings.use_tls {
            SmtpTransport::starttls_relay(&settings.server)
                .map_err(|err| EmailError::Transport(err.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&settings.server)
        };

        let mut builder = builder.port(settings.port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            default_sender: settings.default_sender.clone(),
        })
    }

    fn build_message(&self, message: &EmailMessage) -> Result<Message, EmailError> {
        let from = message
            .from
            .as_deref()
            .or(self.default_sender.as_deref())
            .ok_or_else(|| EmailError::Build("no sender address configured".to_string()))?;

        let mut builder = Message::builder()
            .from(parse_mailbox(from)?)
            .subject(message.subject.as_str());
        for recipient in &message.to {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        builder
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .map_err(|err| EmailError::Build(err.to_string()))
    }
}

impl EmailBackend for SmtpBackend {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let email = self.build_message(message)?;
        self.transport
            .send(&email)
            .map_err(|err| EmailError::Transport(err.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address
        .parse::<Mailbox>()
        .map_err(|err| EmailError::InvalidAddress {
            address: address.to_string(),
            reason: err.to_string(),
        })
}

/// Captures messages in memory. Clones share one outbox.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<Mutex<bool>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send fail with a transport error.
    pub fn fail_sends(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    /// Messages accepted so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        lock(&self.outbox).clone()
    }
}

impl EmailBackend for MemoryBackend {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if *lock(&self.failing) {
            return Err(EmailError::Transport("memory backend set to fail".to_string()));
        }
        lock(&self.outbox).push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// A poisoned lock only means another test thread panicked mid-push; the
// captured data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Logs message metadata instead of delivering.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBackend;

impl EmailBackend for LogBackend {
    fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(
            "event=email_logged module=mail status=ok recipients={} body_chars={}",
            message.to.len(),
            message.html_body.chars().count()
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
