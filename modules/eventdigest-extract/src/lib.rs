pub mod llm;
pub mod rules;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use eventdigest_common::{EnrichedStub, NormalizedEvent};

use crate::llm::LlmExtractor;

// --- Extract trait ---

#[async_trait]
pub trait Extract: Send + Sync {
    /// Produce one normalized event per enriched stub. Output order is
    /// not guaranteed on the LLM path — correlate by URL if it matters.
    async fn extract(&self, stubs: Vec<EnrichedStub>) -> Result<Vec<NormalizedEvent>>;
}

/// Structured extractor: LLM-backed when a credential is configured,
/// otherwise deterministic rule-based derivation from JSON-LD/OpenGraph.
pub struct EventExtractor {
    llm: Option<LlmExtractor>,
}

impl EventExtractor {
    pub fn new(api_key: &str, model: &str) -> Self {
        let llm = if api_key.is_empty() {
            None
        } else {
            Some(LlmExtractor::new(api_key, model))
        };
        Self { llm }
    }

    #[cfg(test)]
    pub(crate) fn rule_based() -> Self {
        Self { llm: None }
    }
}

#[async_trait]
impl Extract for EventExtractor {
    async fn extract(&self, stubs: Vec<EnrichedStub>) -> Result<Vec<NormalizedEvent>> {
        match &self.llm {
            Some(llm) => llm.extract(stubs).await,
            None => {
                warn!(
                    count = stubs.len(),
                    "No LLM credential configured, using rule-based extraction \
                     (topics/type/level/language stay empty)"
                );
                Ok(stubs.iter().map(rules::extract_event).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventdigest_common::EventStub;

    #[tokio::test]
    async fn test_rule_path_never_fails_on_bare_stub() {
        let extractor = EventExtractor::rule_based();
        let stubs = vec![EnrichedStub::empty(EventStub {
            title: "AI Meetup".to_string(),
            url: "https://x/e1".to_string(),
            date_text: None,
            description: String::new(),
        })];

        let events = extractor.extract(stubs).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "AI Meetup");
        assert_eq!(events[0].url, "https://x/e1");
        assert!(events[0].location.is_none());
        assert!(events[0].speakers.is_empty());
        assert!(events[0].topics.is_empty());
        assert!(events[0].event_type.is_none());
    }
}
