use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use super::{Email, Mailer};
use crate::config::MailConfig;

const SEND_ENDPOINT: &str = "https://api.mailjet.com/v3/send";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers mail through the Mailjet v3 send API.
pub struct MailjetMailer {
    http_client: reqwest::Client,
    api_key: String,
    api_secret: String,
    sender: String,
    sender_name: String,
}

#[derive(Serialize)]
struct SendPayload<'a> {
    #[serde(rename = "FromEmail")]
    from_email: &'a str,
    #[serde(rename = "FromName")]
    from_name: &'a str,
    #[serde(rename = "Subject")]
    subject: &'a str,
    #[serde(rename = "Html-part")]
    html_part: &'a str,
    #[serde(rename = "Text-part")]
    text_part: &'a str,
    #[serde(rename = "Recipients")]
    recipients: [Recipient<'a>; 1],
}

#[derive(Serialize)]
struct Recipient<'a> {
    #[serde(rename = "Email")]
    email: &'a str,
}

impl MailjetMailer {
    pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Self> {
        let api_key = cfg
            .mailjet_api_key
            .clone()
            .context("MAILJET_API_KEY not configured")?;
        let api_secret = cfg
            .mailjet_api_secret
            .clone()
            .context("MAILJET_API_SECRET not configured")?;
        let http_client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("build mailjet http client")?;
        Ok(Self {
            http_client,
            api_key,
            api_secret,
            sender: cfg.sender.clone(),
            sender_name: cfg.sender_name.clone(),
        })
    }
}

#[async_trait]
impl Mailer for MailjetMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        let payload = SendPayload {
            from_email: &self.sender,
            from_name: &self.sender_name,
            subject: &email.subject,
            html_part: &email.html,
            text_part: &email.text,
            recipients: [Recipient { email: &email.to }],
        };

        let resp = self
            .http_client
            .post(SEND_ENDPOINT)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&payload)
            .send()
            .await
            .context("mailjet request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(%status, body = %body, to = %email.to, "mailjet rejected message");
            anyhow::bail!("mailjet returned {status}");
        }

        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_mailjet_field_names() {
        let payload = SendPayload {
            from_email: "noreply@example.com",
            from_name: "Sender",
            subject: "Hi",
            html_part: "<p>x</p>",
            text_part: "x",
            recipients: [Recipient { email: "a@example.com" }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["FromEmail"], "noreply@example.com");
        assert_eq!(json["Html-part"], "<p>x</p>");
        assert_eq!(json["Recipients"][0]["Email"], "a@example.com");
    }

    #[test]
    fn requires_credentials() {
        let cfg = MailConfig {
            mailjet_api_key: Some("key".into()),
            mailjet_api_secret: None,
            sender: "noreply@example.com".into(),
            sender_name: "Sender".into(),
        };
        assert!(MailjetMailer::from_config(&cfg).is_err());
    }

    #[test]
    fn builds_with_credentials() {
        let cfg = MailConfig {
            mailjet_api_key: Some("key".into()),
            mailjet_api_secret: Some("secret".into()),
            sender: "noreply@example.com".into(),
            sender_name: "Sender".into(),
        };
        let mailer = MailjetMailer::from_config(&cfg).unwrap();
        assert_eq!(mailer.api_key, "key");
    }
}
