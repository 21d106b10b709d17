//! Notification events and their delivery.
//!
//! Pipeline stages only produce [`Notification`] values. Delivery happens once, at the end
//! of a run, through [`Notifier::dispatch`], and a delivery failure is logged, never raised.

use crate::config::NotificationConfig;
use crate::error::{Result, UpdaterError};
use crate::{log_debug, log_error, log_info, log_warn};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub const FAILURE_SUBJECT: &str = "Dependency Updater Failed";
pub const SUCCESS_SUBJECT: &str = "Dependencies Updated";
pub const MANUAL_REVIEW_SUBJECT: &str = "Major Dependency Updates Available";

/// What a notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A review request was opened
    Success,
    /// Major updates need a human
    ManualReview,
    /// A stage on the safe path failed
    Failure,
    /// The selected platform is unsupported or not configured
    ConfigError,
}

/// A message for the maintainer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn success(review_url: &str) -> Self {
        Self {
            kind: NotificationKind::Success,
            subject: SUCCESS_SUBJECT.to_string(),
            body: format!("A new pull request has been created: {review_url}"),
        }
    }

    pub fn manual_review(summary: &str) -> Self {
        Self {
            kind: NotificationKind::ManualReview,
            subject: MANUAL_REVIEW_SUBJECT.to_string(),
            body: format!("Manual review needed for the following major updates:\n{summary}"),
        }
    }

    pub fn failure(error: &UpdaterError) -> Self {
        Self {
            kind: NotificationKind::Failure,
            subject: FAILURE_SUBJECT.to_string(),
            body: error.to_string(),
        }
    }

    pub fn config_error(error: &UpdaterError) -> Self {
        Self {
            kind: NotificationKind::ConfigError,
            subject: FAILURE_SUBJECT.to_string(),
            body: error.to_string(),
        }
    }
}

/// Delivers a subject and body over some channel
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

const IMPLICIT_TLS_PORT: u16 = 465;

/// Mail over SMTP with TLS
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpTransport {
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let (Some(username), Some(password), Some(to)) = (
            config.username.as_deref(),
            config.password.as_deref(),
            config.to.as_deref(),
        ) else {
            return Err(UpdaterError::Config(
                "EMAIL_USER, EMAIL_PASS and NOTIFICATION_EMAIL must be set for email notifications."
                    .to_string(),
            ));
        };

        let from = parse_mailbox(config.sender().unwrap_or(username))?;
        let to = parse_mailbox(to)?;

        // 465 is implicit TLS, any other port upgrades with STARTTLS
        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        };
        let mailer = builder
            .map_err(|e| UpdaterError::Notification(format!("Invalid SMTP host: {e}")))?
            .port(config.smtp_port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        Ok(Self { mailer, from, to })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| UpdaterError::Config(format!("Invalid email address {address:?}: {e}")))
}

#[async_trait]
impl NotificationTransport for SmtpTransport {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| UpdaterError::Notification(e.to_string()))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| UpdaterError::Notification(e.to_string()))?;
        Ok(())
    }
}

/// Writes notifications to the log when no mail account is configured
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        log_info!("[notification] {}: {}", subject, body);
        Ok(())
    }
}

/// Sends notification events through one transport
pub struct Notifier {
    transport: Box<dyn NotificationTransport>,
}

impl Notifier {
    pub fn new(transport: Box<dyn NotificationTransport>) -> Self {
        Self { transport }
    }

    /// SMTP when the account is complete, otherwise the log
    pub fn from_config(config: &NotificationConfig) -> Self {
        if !config.is_complete() {
            log_warn!("Email notifications are not configured; notifications go to the log");
            return Self::new(Box::new(LogTransport));
        }

        match SmtpTransport::from_config(config) {
            Ok(transport) => Self::new(Box::new(transport)),
            Err(e) => {
                log_warn!("Email notifications disabled: {}", e);
                Self::new(Box::new(LogTransport))
            }
        }
    }

    /// Deliver every notification in order, returning how many went out
    pub async fn dispatch(&self, notifications: &[Notification]) -> usize {
        let mut delivered = 0;
        for notification in notifications {
            match self
                .transport
                .send(&notification.subject, &notification.body)
                .await
            {
                Ok(()) => {
                    log_debug!("Sent notification: {}", notification.subject);
                    delivered += 1;
                }
                Err(e) => log_error!("Failed to send notification {:?}: {}", notification.subject, e),
            }
        }
        delivered
    }
}
