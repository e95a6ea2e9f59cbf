//! The scrape → enrich → extract → upsert → notify orchestrator.
//!
//! Single-writer: callers must not run two pipelines concurrently
//! against the same storage. Every run gets a ScrapeRun row whose
//! terminal status is written exactly once, on the single exit path
//! of `run()`.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, error, info};

use eventdigest_common::{
    external_id, Channel, EventLanguage, EventLevel, EventType, NormalizedEvent, RunStatus,
};
use eventdigest_extract::Extract;
use eventdigest_notify::format::{format_event_email, format_telegram_message};
use eventdigest_notify::ical::make_ics_attachment;
use eventdigest_notify::{Attachment, EmailSender, TelegramSender};
use eventdigest_scraper::{DetailEnricher, EventSource};
use eventdigest_store::{Event, NewEvent, Store};

const EMAIL_SUBJECT: &str = "Nove eventy na DataTalk";

/// Counters from one pipeline run.
#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub events_found: u32,
    pub events_new: u32,
    pub events_updated: u32,
    pub subscribers_notified: u32,
    pub emails_sent: u32,
    pub telegrams_sent: u32,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Scrape Run Complete ===")?;
        writeln!(f, "Events found:          {}", self.events_found)?;
        writeln!(f, "Events new:            {}", self.events_new)?;
        writeln!(f, "Events updated:        {}", self.events_updated)?;
        writeln!(f, "Subscribers notified:  {}", self.subscribers_notified)?;
        writeln!(f, "Emails sent:           {}", self.emails_sent)?;
        writeln!(f, "Telegram messages:     {}", self.telegrams_sent)?;
        Ok(())
    }
}

pub struct Pipeline {
    source: Arc<dyn EventSource>,
    enricher: Arc<dyn DetailEnricher>,
    extractor: Arc<dyn Extract>,
    store: Arc<dyn Store>,
    email: Arc<dyn EmailSender>,
    telegram: Arc<dyn TelegramSender>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn EventSource>,
        enricher: Arc<dyn DetailEnricher>,
        extractor: Arc<dyn Extract>,
        store: Arc<dyn Store>,
        email: Arc<dyn EmailSender>,
        telegram: Arc<dyn TelegramSender>,
    ) -> Self {
        Self {
            source,
            enricher,
            extractor,
            store,
            email,
            telegram,
        }
    }

    /// Run the full pipeline once. The ScrapeRun row is created before
    /// any work and finalized exactly once whether the run succeeds or
    /// fails; a failure is recorded, then propagated to the caller.
    pub async fn run(&self) -> Result<PipelineStats> {
        let run_id = self.store.create_run().await?;
        info!(%run_id, "Scrape run started");

        let result = self.run_inner().await;

        match result {
            Ok(stats) => {
                self.store
                    .finish_run(
                        run_id,
                        RunStatus::Success,
                        stats.events_found as i32,
                        stats.events_new as i32,
                        None,
                    )
                    .await?;
                Ok(stats)
            }
            Err(e) => {
                let message = format!("{e:#}");
                if let Err(finish_err) = self
                    .store
                    .finish_run(run_id, RunStatus::Failed, 0, 0, Some(&message))
                    .await
                {
                    error!(error = %finish_err, "Failed to record failed run");
                }
                Err(e)
            }
        }
    }

    async fn run_inner(&self) -> Result<PipelineStats> {
        let mut stats = PipelineStats::default();

        let stubs = self.source.scrape().await.context("Listing scrape failed")?;
        if stubs.is_empty() {
            info!("No events found on the listing page");
            return Ok(stats);
        }

        let enriched = self.enricher.fetch_details(stubs).await;

        let extracted = self
            .extractor
            .extract(enriched)
            .await
            .context("Extraction failed")?;
        stats.events_found = extracted.len() as u32;

        let batch: Vec<NewEvent> = extracted.iter().map(to_new_event).collect();
        let upserted = self.store.upsert_events(&batch).await?;
        stats.events_new = upserted.iter().filter(|(_, inserted)| *inserted).count() as u32;
        stats.events_updated = upserted.len() as u32 - stats.events_new;
        info!(
            found = stats.events_found,
            new = stats.events_new,
            updated = stats.events_updated,
            "Events upserted"
        );

        // Past events are recorded but never drive notifications.
        let now = Utc::now();
        let eligible: Vec<Event> = upserted
            .into_iter()
            .map(|(event, _)| event)
            .filter(|event| event.date.map_or(true, |date| date > now))
            .collect();

        if eligible.is_empty() {
            info!("No notification-eligible events");
            return Ok(stats);
        }

        self.notify_subscribers(&eligible, &mut stats).await?;
        Ok(stats)
    }

    /// Dispatch notifications per subscriber. The delta for both
    /// channels keys off the email channel's log rows; a subscriber
    /// with nothing new gets nothing at all.
    async fn notify_subscribers(
        &self,
        eligible: &[Event],
        stats: &mut PipelineStats,
    ) -> Result<()> {
        let subscribers = self.store.verified_subscribers().await?;
        info!(
            subscribers = subscribers.len(),
            eligible = eligible.len(),
            "Computing notification deltas"
        );

        for subscriber in subscribers {
            let already_notified = self
                .store
                .notified_event_ids(subscriber.id, Channel::Email)
                .await?;
            let delta: Vec<Event> = eligible
                .iter()
                .filter(|event| !already_notified.contains(&event.id))
                .cloned()
                .collect();

            if delta.is_empty() {
                debug!(email = %subscriber.email, "No unseen events for subscriber");
                continue;
            }

            let html = format_event_email(&delta);
            let attachments: Vec<Attachment> = delta.iter().map(make_ics_attachment).collect();
            let email_ok = self
                .email
                .send(&subscriber.email, EMAIL_SUBJECT, &html, &attachments)
                .await;
            if email_ok {
                stats.emails_sent += 1;
            }
            // Log regardless of transport outcome: at-least-attempt.
            for event in &delta {
                self.store
                    .log_notification(subscriber.id, event.id, Channel::Email)
                    .await?;
            }

            if let Some(chat_id) = &subscriber.telegram_chat_id {
                let text = format_telegram_message(&delta);
                let telegram_ok = self.telegram.send_message(chat_id, &text).await;
                if telegram_ok {
                    stats.telegrams_sent += 1;
                }
                for event in &delta {
                    self.store
                        .log_notification(subscriber.id, event.id, Channel::Telegram)
                        .await?;
                }
            }

            stats.subscribers_notified += 1;
            info!(
                email = %subscriber.email,
                events = delta.len(),
                "Subscriber notified"
            );
        }

        Ok(())
    }
}

/// Convert an extracted event into upsert parameters. Dates arrive as
/// unparsed strings; enum-ish strings parse leniently (unknown → null).
fn to_new_event(event: &NormalizedEvent) -> NewEvent {
    NewEvent {
        external_id: external_id(&event.url),
        title: event.title.clone(),
        date: event.date.as_deref().and_then(parse_event_date),
        end_date: event.end_date.as_deref().and_then(parse_event_date),
        location: event.location.clone(),
        description: Some(event.description.clone()).filter(|d| !d.is_empty()),
        url: event.url.clone(),
        topics: event.topics.clone(),
        speakers: event.speakers.clone(),
        event_type: event.event_type.as_deref().and_then(EventType::parse),
        level: event.level.as_deref().and_then(EventLevel::parse),
        language: event.language.as_deref().and_then(EventLanguage::parse),
        organizer: event.organizer.clone(),
        image_url: event.image_url.clone(),
    }
}

/// Parse an ISO-8601 date or datetime string. A bare date defaults to
/// 09:00. Unparseable values resolve to None, never an error.
pub fn parse_event_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0)?));
    }

    None
}
