use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A candidate event parsed from the listing page, pre-enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStub {
    pub title: String,
    /// Absolute URL of the event detail page.
    pub url: String,
    /// Raw, unparsed date/location text from the listing, if any.
    pub date_text: Option<String>,
    /// Visible listing text, truncated to 500 chars.
    pub description: String,
}

/// An event stub plus everything the detail fetcher could recover
/// from its detail page (or a search-located substitute page).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedStub {
    pub stub: EventStub,
    /// First Event-typed JSON-LD object found on the page.
    pub json_ld: Option<serde_json::Value>,
    /// OpenGraph `og:*` properties, property → content.
    pub og_meta: HashMap<String, String>,
    /// Main page content as markdown, truncated to 3000 chars.
    pub markdown: String,
}

impl EnrichedStub {
    /// An enriched stub with empty defaults, used when the detail
    /// fetch fails or the page yields nothing usable.
    pub fn empty(stub: EventStub) -> Self {
        Self {
            stub,
            json_ld: None,
            og_meta: HashMap::new(),
            markdown: String::new(),
        }
    }
}

/// What extraction returns for each event. Dates stay unparsed strings
/// here; the pipeline parses them at the persist boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedEvent {
    pub title: String,
    /// ISO-8601 start datetime, or null if unknown
    pub date: Option<String>,
    /// ISO-8601 end datetime, or null
    pub end_date: Option<String>,
    /// "online" or a place name, or null
    pub location: Option<String>,
    /// Topic tags like ["AI", "Data", "Python"]
    #[serde(default)]
    pub topics: Vec<String>,
    /// "workshop", "meetup", "conference", or "webinar"
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// "beginner", "intermediate", or "advanced"
    pub level: Option<String>,
    /// "cs" or "en"
    pub language: Option<String>,
    /// Detail page URL, preserved from input
    pub url: String,
    /// Short summary of the event
    #[serde(default)]
    pub description: String,
    /// Speaker names, in page order
    #[serde(default)]
    pub speakers: Vec<String>,
    /// Organizing person or group, or null
    pub organizer: Option<String>,
    /// Promotional image URL, or null
    pub image_url: Option<String>,
}

/// A web search hit, used by the blocked-page fallback.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

// --- Persisted-model enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Workshop,
    Meetup,
    Conference,
    Webinar,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workshop => "workshop",
            Self::Meetup => "meetup",
            Self::Conference => "conference",
            Self::Webinar => "webinar",
        }
    }

    /// Lenient parse — unknown values map to None rather than an error.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "workshop" => Some(Self::Workshop),
            "meetup" => Some(Self::Meetup),
            "conference" => Some(Self::Conference),
            "webinar" => Some(Self::Webinar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLanguage {
    Cs,
    En,
}

impl EventLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cs => "cs",
            Self::En => "en",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cs" => Some(Self::Cs),
            "en" => Some(Self::En),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberStatus {
    Pending,
    Verified,
    Unsubscribed,
}

impl SubscriberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Unsubscribed => "unsubscribed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            "unsubscribed" => Some(Self::Unsubscribed),
            _ => None,
        }
    }
}

/// Notification channel, the second half of the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Telegram,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Telegram => "telegram",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trips() {
        for t in [
            EventType::Workshop,
            EventType::Meetup,
            EventType::Conference,
            EventType::Webinar,
        ] {
            assert_eq!(EventType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EventType::parse("talk"), None);
        assert_eq!(EventLevel::parse("advanced"), Some(EventLevel::Advanced));
        assert_eq!(EventLanguage::parse("de"), None);
    }

    #[test]
    fn test_normalized_event_tolerates_missing_fields() {
        let event: NormalizedEvent =
            serde_json::from_str(r#"{"title": "AI Meetup", "url": "https://x/e1"}"#).unwrap();
        assert_eq!(event.title, "AI Meetup");
        assert!(event.date.is_none());
        assert!(event.topics.is_empty());
        assert!(event.speakers.is_empty());
    }

    #[test]
    fn test_normalized_event_type_field_name() {
        let event: NormalizedEvent = serde_json::from_str(
            r#"{"title": "W", "url": "https://x/w", "type": "workshop"}"#,
        )
        .unwrap();
        assert_eq!(event.event_type.as_deref(), Some("workshop"));
    }
}
