//! Orchestrator integration tests against the in-memory store, with
//! stub stages and recording notification transports.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use eventdigest_common::{Channel, EnrichedStub, EventStub};
use eventdigest_extract::EventExtractor;
use eventdigest_notify::{Attachment, EmailSender, TelegramSender};
use eventdigest_pipeline::Pipeline;
use eventdigest_scraper::{DetailEnricher, EventSource};
use eventdigest_store::testing::MemoryStore;
use eventdigest_store::Store;

// --- Stub stages ---

struct StaticSource {
    stubs: Vec<EventStub>,
}

#[async_trait]
impl EventSource for StaticSource {
    async fn scrape(&self) -> Result<Vec<EventStub>> {
        Ok(self.stubs.clone())
    }
}

struct FailingSource;

#[async_trait]
impl EventSource for FailingSource {
    async fn scrape(&self) -> Result<Vec<EventStub>> {
        anyhow::bail!("listing fetch returned 503")
    }
}

/// Enriches each stub with empty defaults, plus JSON-LD for URLs the
/// test registered one for.
#[derive(Default)]
struct StaticEnricher {
    json_ld_by_url: HashMap<String, serde_json::Value>,
}

#[async_trait]
impl DetailEnricher for StaticEnricher {
    async fn fetch_details(&self, stubs: Vec<EventStub>) -> Vec<EnrichedStub> {
        stubs
            .into_iter()
            .map(|stub| {
                let json_ld = self.json_ld_by_url.get(&stub.url).cloned();
                EnrichedStub {
                    json_ld,
                    ..EnrichedStub::empty(stub)
                }
            })
            .collect()
    }
}

// --- Recording transports ---

#[derive(Default)]
struct RecordingEmail {
    sent: Mutex<Vec<(String, usize)>>,
}

impl RecordingEmail {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(
        &self,
        to: &str,
        _subject: &str,
        _html: &str,
        attachments: &[Attachment],
    ) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), attachments.len()));
        true
    }
}

#[derive(Default)]
struct RecordingTelegram {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingTelegram {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl TelegramSender for RecordingTelegram {
    async fn send_message(&self, chat_id: &str, text: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        true
    }
}

// --- Harness ---

struct Harness {
    store: Arc<MemoryStore>,
    email: Arc<RecordingEmail>,
    telegram: Arc<RecordingTelegram>,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            email: Arc::new(RecordingEmail::default()),
            telegram: Arc::new(RecordingTelegram::default()),
        }
    }

    fn pipeline(&self, source: impl EventSource + 'static, enricher: StaticEnricher) -> Pipeline {
        Pipeline::new(
            Arc::new(source),
            Arc::new(enricher),
            // No credential → deterministic rule-based extraction.
            Arc::new(EventExtractor::new("", "gpt-4o-mini")),
            self.store.clone(),
            self.email.clone(),
            self.telegram.clone(),
        )
    }
}

fn stub(title: &str, url: &str) -> EventStub {
    EventStub {
        title: title.to_string(),
        url: url.to_string(),
        date_text: None,
        description: String::new(),
    }
}

// --- Scenarios ---

#[tokio::test]
async fn test_first_run_inserts_and_notifies_once() {
    let harness = Harness::new();
    harness.store.add_verified_subscriber("a@example.com", None);

    let pipeline = harness.pipeline(
        StaticSource {
            stubs: vec![stub("AI Meetup", "https://x/e1")],
        },
        StaticEnricher::default(),
    );

    let stats = pipeline.run().await.unwrap();
    assert_eq!(stats.events_found, 1);
    assert_eq!(stats.events_new, 1);
    assert_eq!(stats.subscribers_notified, 1);
    assert_eq!(stats.emails_sent, 1);

    let events = harness.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "AI Meetup");
    assert!(events[0].location.is_none());
    assert!(events[0].speakers_vec().is_empty());

    // Exactly one email dispatch with one calendar invite attached.
    assert_eq!(harness.email.count(), 1);
    assert_eq!(harness.email.sent.lock().unwrap()[0].1, 1);
    assert_eq!(harness.telegram.count(), 0);

    let logs = harness.store.notification_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].channel, Channel::Email.as_str());

    let runs = harness.store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "success");
    assert_eq!(runs[0].events_found, 1);
    assert_eq!(runs[0].events_new, 1);
    assert!(runs[0].finished_at.is_some());
}

#[tokio::test]
async fn test_second_identical_run_is_deduped() {
    let harness = Harness::new();
    harness.store.add_verified_subscriber("a@example.com", None);

    for _ in 0..2 {
        let pipeline = harness.pipeline(
            StaticSource {
                stubs: vec![stub("AI Meetup", "https://x/e1")],
            },
            StaticEnricher::default(),
        );
        pipeline.run().await.unwrap();
    }

    // One row per distinct URL, second run was an update.
    assert_eq!(harness.store.events().len(), 1);
    let runs = harness.store.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].events_new, 1);
    assert_eq!(runs[1].events_new, 0);
    assert_eq!(runs[1].status, "success");

    // No second dispatch, ledger unchanged.
    assert_eq!(harness.email.count(), 1);
    assert_eq!(harness.store.notification_logs().len(), 1);
}

#[tokio::test]
async fn test_past_events_are_stored_but_not_notified() {
    let harness = Harness::new();
    harness.store.add_verified_subscriber("a@example.com", None);

    let url = "https://x/past";
    let mut enricher = StaticEnricher::default();
    enricher.json_ld_by_url.insert(
        url.to_string(),
        serde_json::json!({
            "@type": "Event",
            "name": "Old Conference",
            "startDate": "2020-01-15T09:00:00"
        }),
    );

    let pipeline = harness.pipeline(
        StaticSource {
            stubs: vec![stub("Old Conference", url)],
        },
        enricher,
    );

    let stats = pipeline.run().await.unwrap();
    assert_eq!(stats.events_new, 1);
    assert_eq!(stats.emails_sent, 0);
    assert_eq!(harness.email.count(), 0);
    assert!(harness.store.notification_logs().is_empty());
    assert!(harness.store.events()[0].date.is_some());
}

#[tokio::test]
async fn test_telegram_goes_out_with_email() {
    let harness = Harness::new();
    harness
        .store
        .add_verified_subscriber("a@example.com", Some("555001"));

    let pipeline = harness.pipeline(
        StaticSource {
            stubs: vec![stub("AI Meetup", "https://x/e1")],
        },
        StaticEnricher::default(),
    );

    let stats = pipeline.run().await.unwrap();
    assert_eq!(stats.emails_sent, 1);
    assert_eq!(stats.telegrams_sent, 1);
    assert_eq!(harness.telegram.count(), 1);

    // One ledger row per (event, channel).
    let logs = harness.store.notification_logs();
    assert_eq!(logs.len(), 2);
    let channels: Vec<&str> = logs.iter().map(|l| l.channel.as_str()).collect();
    assert!(channels.contains(&"email"));
    assert!(channels.contains(&"telegram"));
}

#[tokio::test]
async fn test_email_ledger_gates_telegram_too() {
    let harness = Harness::new();
    let subscriber = harness
        .store
        .add_verified_subscriber("a@example.com", Some("555001"));

    // First run notifies both channels and logs both ledger rows.
    let pipeline = harness.pipeline(
        StaticSource {
            stubs: vec![stub("AI Meetup", "https://x/e1")],
        },
        StaticEnricher::default(),
    );
    pipeline.run().await.unwrap();
    assert_eq!(harness.telegram.count(), 1);

    // Rerun: email ledger already has the event, so the subscriber is
    // skipped entirely — no telegram-only catch-up dispatch.
    let pipeline = harness.pipeline(
        StaticSource {
            stubs: vec![stub("AI Meetup", "https://x/e1")],
        },
        StaticEnricher::default(),
    );
    pipeline.run().await.unwrap();

    assert_eq!(harness.email.count(), 1);
    assert_eq!(harness.telegram.count(), 1);

    let email_ids = harness
        .store
        .notified_event_ids(subscriber.id, Channel::Email)
        .await
        .unwrap();
    assert_eq!(email_ids.len(), 1);
}

#[tokio::test]
async fn test_empty_listing_is_a_successful_run() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(StaticSource { stubs: Vec::new() }, StaticEnricher::default());

    let stats = pipeline.run().await.unwrap();
    assert_eq!(stats.events_found, 0);

    let runs = harness.store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "success");
    assert_eq!(runs[0].events_found, 0);
}

#[tokio::test]
async fn test_scrape_failure_is_recorded_then_propagated() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(FailingSource, StaticEnricher::default());

    let result = pipeline.run().await;
    assert!(result.is_err());

    let runs = harness.store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "failed");
    assert!(runs[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("503"));
    assert!(runs[0].finished_at.is_some());
    assert!(harness.store.events().is_empty());
}

#[tokio::test]
async fn test_mixed_subscribers_get_independent_deltas() {
    let harness = Harness::new();
    harness.store.add_verified_subscriber("old@example.com", None);

    // First run notifies only the existing subscriber.
    let pipeline = harness.pipeline(
        StaticSource {
            stubs: vec![stub("AI Meetup", "https://x/e1")],
        },
        StaticEnricher::default(),
    );
    pipeline.run().await.unwrap();
    assert_eq!(harness.email.count(), 1);

    // A newcomer subscribes; the rerun catches them up without
    // re-notifying the first subscriber.
    harness.store.add_verified_subscriber("new@example.com", None);
    let pipeline = harness.pipeline(
        StaticSource {
            stubs: vec![stub("AI Meetup", "https://x/e1")],
        },
        StaticEnricher::default(),
    );
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.subscribers_notified, 1);
    assert_eq!(harness.email.count(), 2);
    let recipients: Vec<String> = harness
        .email
        .sent
        .lock()
        .unwrap()
        .iter()
        .map(|(to, _)| to.clone())
        .collect();
    assert_eq!(
        recipients,
        vec!["old@example.com".to_string(), "new@example.com".to_string()]
    );
    assert_eq!(harness.store.notification_logs().len(), 2);
}

#[tokio::test]
async fn test_pending_subscribers_are_not_notified() {
    let harness = Harness::new();
    harness
        .store
        .add_subscriber("pending@example.com", None)
        .await
        .unwrap();

    let pipeline = harness.pipeline(
        StaticSource {
            stubs: vec![stub("AI Meetup", "https://x/e1")],
        },
        StaticEnricher::default(),
    );
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.events_new, 1);
    assert_eq!(stats.subscribers_notified, 0);
    assert_eq!(harness.email.count(), 0);
}
