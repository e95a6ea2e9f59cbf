//! LLM-backed extraction: one chat-completion call per batch, retried
//! with backoff; the final failure propagates and fails the run.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use schemars::schema_for;
use serde_json::json;
use tracing::{info, warn};

use ai_client::{util::strip_code_fence, ChatClient};
use eventdigest_common::{EnrichedStub, NormalizedEvent};

/// Max retry attempts for the extraction call.
const EXTRACT_MAX_ATTEMPTS: u32 = 3;
/// Backoff bounds: min(2s * 3^attempt, 30s) plus random jitter (0-1s).
const EXTRACT_BACKOFF_MIN: Duration = Duration::from_secs(2);
const EXTRACT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Low temperature keeps the extraction close to deterministic.
const EXTRACT_TEMPERATURE: f32 = 0.1;

const INSTRUCTIONS: &str = "Analyze the events below and extract structured data for each one.
Return a JSON array with one object per event:
- title: string
- date: ISO-8601 start datetime or null
- end_date: ISO-8601 end datetime or null
- location: \"online\" or a city/venue name, or null
- topics: array of tags like [\"AI\", \"Data\", \"Python\"]
- type: \"workshop\" | \"meetup\" | \"conference\" | \"webinar\" | null
- level: \"beginner\" | \"intermediate\" | \"advanced\" | null
- language: \"cs\" | \"en\" | null
- url: string (preserve from input)
- description: short summary string
- speakers: array of speaker names
- organizer: string or null
- image_url: string or null

Each object must validate against this JSON Schema:";

pub struct LlmExtractor {
    client: ChatClient,
}

impl LlmExtractor {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: ChatClient::new(api_key, model),
        }
    }

    pub async fn extract(&self, stubs: Vec<EnrichedStub>) -> Result<Vec<NormalizedEvent>> {
        let prompt = build_prompt(&stubs);
        info!(count = stubs.len(), "Extracting events via LLM");

        let mut last_err = anyhow::anyhow!("Extraction not attempted");

        for attempt in 0..EXTRACT_MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff =
                    (EXTRACT_BACKOFF_MIN * 3u32.pow(attempt - 1)).min(EXTRACT_BACKOFF_MAX);
                let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
                warn!(
                    attempt = attempt + 1,
                    backoff_secs = backoff.as_secs(),
                    "Retrying extraction after backoff"
                );
                tokio::time::sleep(backoff + jitter).await;
            }

            match self.client.chat(&prompt, EXTRACT_TEMPERATURE).await {
                Ok(response) => match parse_response(&response) {
                    Ok(events) => {
                        info!(count = events.len(), "LLM extraction complete");
                        return Ok(events);
                    }
                    Err(e) => {
                        last_err = e;
                    }
                },
                Err(e) => {
                    last_err = e.context("Extraction request failed");
                }
            }
        }

        Err(last_err)
    }
}

/// Assemble the batch prompt: fixed instructions, the output schema,
/// then the per-event evidence (markdown is already capped upstream).
pub fn build_prompt(stubs: &[EnrichedStub]) -> String {
    let schema = schema_for!(Vec<NormalizedEvent>);
    let schema_json =
        serde_json::to_string(&schema).unwrap_or_else(|_| "{}".to_string());

    let evidence: Vec<serde_json::Value> = stubs
        .iter()
        .map(|item| {
            json!({
                "title": item.stub.title,
                "url": item.stub.url,
                "date_text": item.stub.date_text,
                "json_ld": item.json_ld,
                "og_meta": item.og_meta,
                "markdown": item.markdown,
            })
        })
        .collect();

    format!(
        "{INSTRUCTIONS}\n{schema_json}\n\nEvents to analyze:\n{}\n\nReturn ONLY the JSON array, no markdown.",
        serde_json::to_string(&evidence).unwrap_or_else(|_| "[]".to_string())
    )
}

/// Parse the model response into normalized events, tolerating a
/// wrapping code fence.
pub fn parse_response(response: &str) -> Result<Vec<NormalizedEvent>> {
    let cleaned = strip_code_fence(response);
    serde_json::from_str(cleaned).context("Extraction response is not a valid JSON array")
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventdigest_common::EventStub;
    use serde_json::json;

    fn sample_stub() -> EnrichedStub {
        EnrichedStub {
            stub: EventStub {
                title: "AI Meetup".to_string(),
                url: "https://datatalk.cz/akce/ai-meetup".to_string(),
                date_text: Some("12. 3. 2026".to_string()),
                description: "Talks and networking".to_string(),
            },
            json_ld: Some(json!({"@type": "Event", "name": "AI Meetup"})),
            og_meta: [("og:title".to_string(), "AI Meetup".to_string())].into(),
            markdown: "# AI Meetup\nTalks and networking".to_string(),
        }
    }

    #[test]
    fn test_prompt_carries_evidence_and_schema() {
        let prompt = build_prompt(&[sample_stub()]);
        assert!(prompt.contains("https://datatalk.cz/akce/ai-meetup"));
        assert!(prompt.contains("12. 3. 2026"));
        assert!(prompt.contains("og:title"));
        assert!(prompt.contains("workshop"));
        assert!(prompt.contains("$schema"));
    }

    #[test]
    fn test_parse_plain_array() {
        let events = parse_response(
            r#"[{"title": "AI Meetup", "url": "https://x/e1", "type": "meetup"}]"#,
        )
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("meetup"));
    }

    #[test]
    fn test_parse_fenced_array() {
        let events = parse_response(
            "```json\n[{\"title\": \"Fenced\", \"url\": \"https://x/e2\"}]\n```",
        )
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Fenced");
    }

    #[test]
    fn test_parse_garbage_is_an_error() {
        assert!(parse_response("the model rambled instead of emitting JSON").is_err());
    }
}
