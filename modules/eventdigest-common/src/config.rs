use std::env;

use tracing::{info, warn};

/// Which outbound email provider to use for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailProvider {
    Resend,
    Sendgrid,
}

impl EmailProvider {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "sendgrid" => Self::Sendgrid,
            "resend" => Self::Resend,
            other => {
                warn!(provider = other, "Unknown EMAIL_PROVIDER, defaulting to resend");
                Self::Resend
            }
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// Constructed once at startup and passed to each component — there is
/// no process-wide settings singleton.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Scraping
    pub scrape_url: String,
    pub detail_concurrency: usize,
    pub detail_timeout_secs: u64,
    pub serper_api_key: String,

    // LLM extraction
    pub openai_api_key: String,
    pub openai_model: String,

    // Notifications
    pub email_provider: EmailProvider,
    pub resend_api_key: String,
    pub sendgrid_api_key: String,
    pub email_from: String,
    pub telegram_bot_token: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            scrape_url: env::var("SCRAPE_URL")
                .unwrap_or_else(|_| "https://datatalk.cz/kalendar-akci/".to_string()),
            detail_concurrency: env::var("SCRAPE_DETAIL_CONCURRENCY")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("SCRAPE_DETAIL_CONCURRENCY must be a number"),
            detail_timeout_secs: env::var("SCRAPE_DETAIL_TIMEOUT")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .expect("SCRAPE_DETAIL_TIMEOUT must be a number"),
            serper_api_key: env::var("SERPER_API_KEY").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            email_provider: EmailProvider::parse(
                &env::var("EMAIL_PROVIDER").unwrap_or_else(|_| "resend".to_string()),
            ),
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "events@datatalk.cz".to_string()),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
        }
    }

    /// Log which optional credentials are configured, without leaking values.
    pub fn log_redacted(&self) {
        info!(
            scrape_url = %self.scrape_url,
            detail_concurrency = self.detail_concurrency,
            detail_timeout_secs = self.detail_timeout_secs,
            openai = !self.openai_api_key.is_empty(),
            serper = !self.serper_api_key.is_empty(),
            resend = !self.resend_api_key.is_empty(),
            sendgrid = !self.sendgrid_api_key.is_empty(),
            telegram = !self.telegram_bot_token.is_empty(),
            "Configuration loaded"
        );
        if self.openai_api_key.is_empty() {
            warn!("OPENAI_API_KEY not set, falling back to rule-based extraction");
        }
        if self.serper_api_key.is_empty() {
            warn!("SERPER_API_KEY not set, blocked-page search fallback disabled");
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
