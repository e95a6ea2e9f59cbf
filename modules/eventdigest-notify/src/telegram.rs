//! Telegram Bot API notifier. Best-effort like email: retried, logged,
//! never fatal.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{error, warn};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

const SEND_MAX_ATTEMPTS: u32 = 3;
const SEND_BACKOFF_MIN: Duration = Duration::from_secs(1);
const SEND_BACKOFF_MAX: Duration = Duration::from_secs(10);

// --- TelegramSender trait ---

#[async_trait]
pub trait TelegramSender: Send + Sync {
    /// Deliver one Markdown message. Returns whether the API accepted it.
    async fn send_message(&self, chat_id: &str, text: &str) -> bool;
}

pub struct TelegramNotifier {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TelegramSender for TelegramNotifier {
    async fn send_message(&self, chat_id: &str, text: &str) -> bool {
        if self.bot_token.is_empty() {
            warn!("TELEGRAM_BOT_TOKEN not set, skipping telegram message");
            return false;
        }

        let url = format!("{TELEGRAM_API_BASE}/bot{}/sendMessage", self.bot_token);
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        for attempt in 0..SEND_MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = (SEND_BACKOFF_MIN * 2u32.pow(attempt - 1)).min(SEND_BACKOFF_MAX);
                let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                tokio::time::sleep(backoff + jitter).await;
            }

            match self.client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => {
                    warn!(chat_id, status = %response.status(), attempt = attempt + 1,
                        "Telegram send rejected");
                }
                Err(e) => {
                    warn!(chat_id, error = %e, attempt = attempt + 1, "Telegram send failed");
                }
            }
        }

        error!(chat_id, "Telegram send exhausted retries");
        false
    }
}
