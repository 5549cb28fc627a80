//! Transactional email: verification and password-reset messages.

mod mailjet;
mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, info};

pub use mailjet::MailjetMailer;

/// A rendered message ready for delivery.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

/// Used when no email provider is configured: messages are logged, not sent.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, "email provider not configured; message logged only");
        debug!(body = %email.text, "undelivered email body");
        Ok(())
    }
}

/// Builds templated messages and hands them to a `Mailer`.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
    reset_ttl_minutes: i64,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, frontend_url: &str, reset_ttl_minutes: i64) -> Self {
        Self {
            mailer,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            reset_ttl_minutes,
        }
    }

    pub async fn send_verification(&self, to: &str, token: &str) -> anyhow::Result<()> {
        let link = format!("{}/verify/{}", self.frontend_url, token);
        let year = OffsetDateTime::now_utc().year();
        let email = Email {
            to: to.to_string(),
            subject: "Verify Your Email - Cancer Classification System".into(),
            html: templates::verification_html(&link, year),
            text: templates::verification_text(&link),
        };
        self.mailer.send(&email).await
    }

    pub async fn send_password_reset(&self, to: &str, token: &str) -> anyhow::Result<()> {
        let link = format!("{}/reset-password/{}", self.frontend_url, token);
        let email = Email {
            to: to.to_string(),
            subject: "Reset Your Password - Cancer Classification System".into(),
            html: templates::reset_html(&link, self.reset_ttl_minutes),
            text: templates::reset_text(&link, self.reset_ttl_minutes),
        };
        self.mailer.send(&email).await
    }
}
