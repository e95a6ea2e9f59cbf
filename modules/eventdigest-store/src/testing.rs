//! In-memory Store implementation for integration tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use eventdigest_common::{Channel, RunStatus, SubscriberStatus};

use crate::error::Result;
use crate::models::{Event, NewEvent, NotificationLog, ScrapeRun, Subscriber};
use crate::store::Store;

/// Vec-backed store with the same semantics as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    events: Vec<Event>,
    subscribers: Vec<Subscriber>,
    logs: Vec<NotificationLog>,
    runs: Vec<ScrapeRun>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_verified_subscriber(&self, email: &str, telegram_chat_id: Option<&str>) -> Subscriber {
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: email.to_string(),
            telegram_chat_id: telegram_chat_id.map(str::to_string),
            status: SubscriberStatus::Verified.as_str().to_string(),
            verification_token: None,
            created_at: Utc::now(),
            verified_at: Some(Utc::now()),
        };
        self.inner.lock().unwrap().subscribers.push(subscriber.clone());
        subscriber
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn notification_logs(&self) -> Vec<NotificationLog> {
        self.inner.lock().unwrap().logs.clone()
    }

    pub fn runs(&self) -> Vec<ScrapeRun> {
        self.inner.lock().unwrap().runs.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_run(&self) -> Result<Uuid> {
        let run = ScrapeRun {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running.as_str().to_string(),
            events_found: 0,
            events_new: 0,
            error_message: None,
        };
        let id = run.id;
        self.inner.lock().unwrap().runs.push(run);
        Ok(id)
    }

    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        events_found: i32,
        events_new: i32,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(run) = inner.runs.iter_mut().find(|r| r.id == run_id) {
            run.finished_at = Some(Utc::now());
            run.status = status.as_str().to_string();
            run.events_found = events_found;
            run.events_new = events_new;
            run.error_message = error_message.map(str::to_string);
        }
        Ok(())
    }

    async fn upsert_events(&self, events: &[NewEvent]) -> Result<Vec<(Event, bool)>> {
        let mut inner = self.inner.lock().unwrap();
        let mut results = Vec::with_capacity(events.len());

        for event in events {
            let topics = serde_json::json!(event.topics);
            let speakers = serde_json::json!(event.speakers);
            let existing = inner
                .events
                .iter_mut()
                .find(|e| e.external_id == event.external_id);

            match existing {
                Some(row) => {
                    row.title = event.title.clone();
                    row.date = event.date;
                    row.end_date = event.end_date;
                    row.location = event.location.clone();
                    row.description = event.description.clone();
                    row.url = event.url.clone();
                    row.topics = topics;
                    row.speakers = speakers;
                    row.event_type = event.event_type.map(|t| t.as_str().to_string());
                    row.level = event.level.map(|l| l.as_str().to_string());
                    row.language = event.language.map(|l| l.as_str().to_string());
                    row.organizer = event.organizer.clone();
                    row.image_url = event.image_url.clone();
                    row.scraped_at = Utc::now();
                    results.push((row.clone(), false));
                }
                None => {
                    let row = Event {
                        id: Uuid::new_v4(),
                        external_id: event.external_id.clone(),
                        title: event.title.clone(),
                        date: event.date,
                        end_date: event.end_date,
                        location: event.location.clone(),
                        description: event.description.clone(),
                        url: event.url.clone(),
                        topics,
                        speakers,
                        event_type: event.event_type.map(|t| t.as_str().to_string()),
                        level: event.level.map(|l| l.as_str().to_string()),
                        language: event.language.map(|l| l.as_str().to_string()),
                        organizer: event.organizer.clone(),
                        image_url: event.image_url.clone(),
                        scraped_at: Utc::now(),
                    };
                    inner.events.push(row.clone());
                    results.push((row, true));
                }
            }
        }

        Ok(results)
    }

    async fn verified_subscribers(&self) -> Result<Vec<Subscriber>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .subscribers
            .iter()
            .filter(|s| s.status == SubscriberStatus::Verified.as_str())
            .cloned()
            .collect())
    }

    async fn notified_event_ids(
        &self,
        subscriber_id: Uuid,
        channel: Channel,
    ) -> Result<HashSet<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .logs
            .iter()
            .filter(|l| l.subscriber_id == subscriber_id && l.channel == channel.as_str())
            .map(|l| l.event_id)
            .collect())
    }

    async fn log_notification(
        &self,
        subscriber_id: Uuid,
        event_id: Uuid,
        channel: Channel,
    ) -> Result<()> {
        self.inner.lock().unwrap().logs.push(NotificationLog {
            id: Uuid::new_v4(),
            subscriber_id,
            event_id,
            channel: channel.as_str().to_string(),
            sent_at: Utc::now(),
            status: "sent".to_string(),
        });
        Ok(())
    }

    async fn add_subscriber(
        &self,
        email: &str,
        telegram_chat_id: Option<&str>,
    ) -> Result<Subscriber> {
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: email.to_string(),
            telegram_chat_id: telegram_chat_id.map(str::to_string),
            status: SubscriberStatus::Pending.as_str().to_string(),
            verification_token: Some(Uuid::new_v4().to_string()),
            created_at: Utc::now(),
            verified_at: None,
        };
        self.inner.lock().unwrap().subscribers.push(subscriber.clone());
        Ok(subscriber)
    }

    async fn verify_subscriber(&self, token: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(subscriber) = inner.subscribers.iter_mut().find(|s| {
            s.verification_token.as_deref() == Some(token)
                && s.status == SubscriberStatus::Pending.as_str()
        }) else {
            return Ok(false);
        };
        subscriber.status = SubscriberStatus::Verified.as_str().to_string();
        subscriber.verification_token = None;
        subscriber.verified_at = Some(Utc::now());
        Ok(true)
    }

    async fn unsubscribe(&self, email: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(subscriber) = inner.subscribers.iter_mut().find(|s| s.email == email) else {
            return Ok(false);
        };
        subscriber.status = SubscriberStatus::Unsubscribed.as_str().to_string();
        Ok(true)
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<ScrapeRun>> {
        let inner = self.inner.lock().unwrap();
        let mut runs = inner.runs.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit as usize);
        Ok(runs)
    }
}
