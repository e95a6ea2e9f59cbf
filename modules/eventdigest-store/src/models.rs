use chrono::{DateTime, Utc};
use uuid::Uuid;

use eventdigest_common::{EventLanguage, EventLevel, EventType};

/// A persisted event row. One row per distinct URL, keyed by
/// `external_id`; mutable fields are overwritten in place on upsert.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub external_id: String,
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: String,
    /// Serialized JSON array of topic strings.
    pub topics: serde_json::Value,
    /// Serialized JSON array of speaker names.
    pub speakers: serde_json::Value,
    pub event_type: Option<String>,
    pub level: Option<String>,
    pub language: Option<String>,
    pub organizer: Option<String>,
    pub image_url: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl Event {
    pub fn topics_vec(&self) -> Vec<String> {
        serde_json::from_value(self.topics.clone()).unwrap_or_default()
    }

    pub fn speakers_vec(&self) -> Vec<String> {
        serde_json::from_value(self.speakers.clone()).unwrap_or_default()
    }
}

/// Parameters for upserting an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub external_id: String,
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub topics: Vec<String>,
    pub speakers: Vec<String>,
    pub event_type: Option<EventType>,
    pub level: Option<EventLevel>,
    pub language: Option<EventLanguage>,
    pub organizer: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub telegram_chat_id: Option<String>,
    pub status: String,
    pub verification_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Append-only dedup ledger: one row per dispatched
/// (subscriber, event, channel) triple. Never updated or deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationLog {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub event_id: Uuid,
    pub channel: String,
    pub sent_at: DateTime<Utc>,
    pub status: String,
}

/// One row per pipeline invocation, finalized exactly once.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    pub events_found: i32,
    pub events_new: i32,
    pub error_message: Option<String>,
}
