use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use eventdigest_common::{Channel, RunStatus, SubscriberStatus};

use crate::error::Result;
use crate::models::{Event, NewEvent, ScrapeRun, Subscriber};

// --- Store trait ---

/// Persistence seam for the pipeline. The Postgres implementation is
/// the production one; tests use the in-memory store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a ScrapeRun row with status=running, visible immediately.
    async fn create_run(&self) -> Result<Uuid>;

    /// Finalize a run. Called exactly once per run.
    async fn finish_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        events_found: i32,
        events_new: i32,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Upsert a batch of events in one transaction, keyed by
    /// `external_id`. Returns each stored row with an inserted flag
    /// (false means an existing row was overwritten).
    async fn upsert_events(&self, events: &[NewEvent]) -> Result<Vec<(Event, bool)>>;

    async fn verified_subscribers(&self) -> Result<Vec<Subscriber>>;

    /// Event ids already logged to a subscriber on a channel — the
    /// notification dedup set.
    async fn notified_event_ids(
        &self,
        subscriber_id: Uuid,
        channel: Channel,
    ) -> Result<HashSet<Uuid>>;

    /// Append one dedup-ledger row. Logged regardless of whether the
    /// transport reported success.
    async fn log_notification(
        &self,
        subscriber_id: Uuid,
        event_id: Uuid,
        channel: Channel,
    ) -> Result<()>;

    /// Create a pending subscriber with a fresh verification token.
    async fn add_subscriber(&self, email: &str, telegram_chat_id: Option<&str>)
        -> Result<Subscriber>;

    /// Consume a verification token. Returns false for unknown tokens.
    async fn verify_subscriber(&self, token: &str) -> Result<bool>;

    /// Mark a subscriber unsubscribed. Rows are never hard-deleted.
    async fn unsubscribe(&self, email: &str) -> Result<bool>;

    /// Most recent runs, newest first, for operational visibility.
    async fn recent_runs(&self, limit: i64) -> Result<Vec<ScrapeRun>>;
}

// --- Postgres implementation ---

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn upsert_one(
        tx: &mut Transaction<'_, Postgres>,
        event: &NewEvent,
    ) -> Result<(Event, bool)> {
        let existing: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM events WHERE external_id = $1")
                .bind(&event.external_id)
                .fetch_optional(&mut **tx)
                .await?;

        let topics = serde_json::json!(event.topics);
        let speakers = serde_json::json!(event.speakers);
        let event_type = event.event_type.map(|t| t.as_str());
        let level = event.level.map(|l| l.as_str());
        let language = event.language.map(|l| l.as_str());

        let row = match existing {
            Some(id) => {
                let row = sqlx::query_as::<_, Event>(
                    r#"
                    UPDATE events SET
                        title = $2, date = $3, end_date = $4, location = $5,
                        description = $6, url = $7, topics = $8, speakers = $9,
                        event_type = $10, level = $11, language = $12,
                        organizer = $13, image_url = $14, scraped_at = $15
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(&event.title)
                .bind(event.date)
                .bind(event.end_date)
                .bind(&event.location)
                .bind(&event.description)
                .bind(&event.url)
                .bind(&topics)
                .bind(&speakers)
                .bind(event_type)
                .bind(level)
                .bind(language)
                .bind(&event.organizer)
                .bind(&event.image_url)
                .bind(Utc::now())
                .fetch_one(&mut **tx)
                .await?;
                (row, false)
            }
            None => {
                let row = sqlx::query_as::<_, Event>(
                    r#"
                    INSERT INTO events
                        (id, external_id, title, date, end_date, location,
                         description, url, topics, speakers, event_type,
                         level, language, organizer, image_url, scraped_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                            $12, $13, $14, $15, $16)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(&event.external_id)
                .bind(&event.title)
                .bind(event.date)
                .bind(event.end_date)
                .bind(&event.location)
                .bind(&event.description)
                .bind(&event.url)
                .bind(&topics)
                .bind(&speakers)
                .bind(event_type)
                .bind(level)
                .bind(language)
                .bind(&event.organizer)
                .bind(&event.image_url)
                .bind(Utc::now())
                .fetch_one(&mut **tx)
                .await?;
                (row, true)
            }
        };

        Ok(row)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_run(&self) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO scrape_runs (id, status) VALUES ($1, 'running') RETURNING id",
        )
        .bind(Uuid::new_v4())
        .fetch_one(&self.pool)
        .await?;
        debug!(run_id = %id, "ScrapeRun created");
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
        sqlx::query(
            r#"
            UPDATE scrape_runs SET
                finished_at = $2, status = $3, events_found = $4,
                events_new = $5, error_message = $6
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(Utc::now())
        .bind(status.as_str())
        .bind(events_found)
        .bind(events_new)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_events(&self, events: &[NewEvent]) -> Result<Vec<(Event, bool)>> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(events.len());
        for event in events {
            results.push(Self::upsert_one(&mut tx, event).await?);
        }
        tx.commit().await?;
        Ok(results)
    }

    async fn verified_subscribers(&self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query_as::<_, Subscriber>(
            "SELECT * FROM subscribers WHERE status = $1 ORDER BY created_at",
        )
        .bind(SubscriberStatus::Verified.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn notified_event_ids(
        &self,
        subscriber_id: Uuid,
        channel: Channel,
    ) -> Result<HashSet<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT event_id FROM notification_log WHERE subscriber_id = $1 AND channel = $2",
        )
        .bind(subscriber_id)
        .bind(channel.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn log_notification(
        &self,
        subscriber_id: Uuid,
        event_id: Uuid,
        channel: Channel,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_log (id, subscriber_id, event_id, channel, sent_at, status)
            VALUES ($1, $2, $3, $4, $5, 'sent')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(subscriber_id)
        .bind(event_id)
        .bind(channel.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_subscriber(
        &self,
        email: &str,
        telegram_chat_id: Option<&str>,
    ) -> Result<Subscriber> {
        let row = sqlx::query_as::<_, Subscriber>(
            r#"
            INSERT INTO subscribers (id, email, telegram_chat_id, status, verification_token)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(telegram_chat_id)
        .bind(SubscriberStatus::Pending.as_str())
        .bind(Uuid::new_v4().to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn verify_subscriber(&self, token: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE subscribers SET
                status = $2, verification_token = NULL, verified_at = $3
            WHERE verification_token = $1 AND status = $4
            "#,
        )
        .bind(token)
        .bind(SubscriberStatus::Verified.as_str())
        .bind(Utc::now())
        .bind(SubscriberStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unsubscribe(&self, email: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE subscribers SET status = $2 WHERE email = $1")
            .bind(email)
            .bind(SubscriberStatus::Unsubscribed.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<ScrapeRun>> {
        let rows = sqlx::query_as::<_, ScrapeRun>(
            "SELECT * FROM scrape_runs ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
