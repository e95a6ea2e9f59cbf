//! Outbound email. Two providers behind one trait, selected by
//! configuration. Sends are best-effort: retried with backoff, then
//! logged and reported as `false` — never fatal to the run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{error, info, warn};

use eventdigest_common::{Config, EmailProvider};

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Max attempts per send.
const SEND_MAX_ATTEMPTS: u32 = 3;
/// Backoff bounds: min(1s * 2^attempt, 10s) plus random jitter (0-1s).
const SEND_BACKOFF_MIN: Duration = Duration::from_secs(1);
const SEND_BACKOFF_MAX: Duration = Duration::from_secs(10);

/// A base64-encoded email attachment.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub content: String,
    pub filename: String,
    pub mime_type: String,
}

// --- EmailSender trait ---

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver one message. Returns whether the provider accepted it.
    async fn send(&self, to: &str, subject: &str, html: &str, attachments: &[Attachment])
        -> bool;
}

/// Pick the configured provider.
pub fn email_sender_from_config(config: &Config) -> Arc<dyn EmailSender> {
    match config.email_provider {
        EmailProvider::Sendgrid => Arc::new(SendGridSender::new(
            &config.sendgrid_api_key,
            &config.email_from,
        )),
        EmailProvider::Resend => {
            Arc::new(ResendSender::new(&config.resend_api_key, &config.email_from))
        }
    }
}

/// POST the payload up to SEND_MAX_ATTEMPTS times, backing off between
/// attempts. Returns whether a success status was ever observed.
async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    payload: &serde_json::Value,
    provider: &str,
) -> bool {
    for attempt in 0..SEND_MAX_ATTEMPTS {
        if attempt > 0 {
            let backoff = (SEND_BACKOFF_MIN * 2u32.pow(attempt - 1)).min(SEND_BACKOFF_MAX);
            let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
            tokio::time::sleep(backoff + jitter).await;
        }

        match client
            .post(url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => return true,
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(provider, %status, body, attempt = attempt + 1, "Email send rejected");
            }
            Err(e) => {
                warn!(provider, error = %e, attempt = attempt + 1, "Email send failed");
            }
        }
    }

    error!(provider, "Email send exhausted retries");
    false
}

// --- Resend ---

pub struct ResendSender {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl ResendSender {
    pub fn new(api_key: &str, from: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            from: from.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendSender {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachments: &[Attachment],
    ) -> bool {
        if self.api_key.is_empty() {
            warn!("RESEND_API_KEY not set, skipping email");
            return false;
        }

        let mut payload = serde_json::json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "html": html,
        });
        if !attachments.is_empty() {
            payload["attachments"] = attachments
                .iter()
                .map(|a| {
                    serde_json::json!({
                        "content": a.content,
                        "filename": a.filename,
                    })
                })
                .collect();
        }

        let sent = post_with_retry(&self.client, RESEND_API_URL, &self.api_key, &payload, "resend")
            .await;
        if sent {
            info!(to, "Email sent via Resend");
        }
        sent
    }
}

// --- SendGrid ---

pub struct SendGridSender {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl SendGridSender {
    pub fn new(api_key: &str, from: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            from: from.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailSender for SendGridSender {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachments: &[Attachment],
    ) -> bool {
        if self.api_key.is_empty() {
            warn!("SENDGRID_API_KEY not set, skipping email");
            return false;
        }

        let mut payload = serde_json::json!({
            "personalizations": [{"to": [{"email": to}]}],
            "from": {"email": self.from},
            "subject": subject,
            "content": [{"type": "text/html", "value": html}],
        });
        if !attachments.is_empty() {
            payload["attachments"] = attachments
                .iter()
                .map(|a| {
                    serde_json::json!({
                        "content": a.content,
                        "filename": a.filename,
                        "type": a.mime_type,
                    })
                })
                .collect();
        }

        let sent = post_with_retry(
            &self.client,
            SENDGRID_API_URL,
            &self.api_key,
            &payload,
            "sendgrid",
        )
        .await;
        if sent {
            info!(to, "Email sent via SendGrid");
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_skips_without_network() {
        let sender = ResendSender::new("", "events@datatalk.cz");
        assert!(!sender.send("a@example.com", "Subject", "<p>Hi</p>", &[]).await);

        let sender = SendGridSender::new("", "events@datatalk.cz");
        assert!(!sender.send("a@example.com", "Subject", "<p>Hi</p>", &[]).await);
    }
}
