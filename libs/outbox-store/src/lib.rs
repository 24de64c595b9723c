//! The Outbox Store: a relational table holding pending envelopes plus a
//! change-notification channel. Owned exclusively by the outbox
//! processor once the ingest writer's transaction commits.
//!
//! See spec §4.3 for the adapter contract this module implements.

mod error;
mod listener;

pub use error::{OutboxError, OutboxResult};
pub use listener::PgOutboxListener;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_envelope::Envelope;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

/// Embedded migrations for the `outbox_events` table, relative to this
/// crate's manifest directory. Whichever binary owns the table (the
/// outbox processor) runs this at startup, per the teacher's pattern of
/// each storage-owning crate shipping its own `sqlx::migrate!` call.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// An outbox entry: an envelope awaiting durable fan-out to the event
/// store and event log. Short-lived — it exists only while the envelope
/// has not yet been confirmed durable in both sinks.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub outbox_id: Uuid,
    pub envelope: Envelope,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Adapter contract for the outbox table (spec §4.3).
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Atomic row append. Post-commit, the table's trigger emits a
    /// notification on channel `outbox_insert` carrying `event_id`.
    async fn insert(&self, envelope: &Envelope) -> OutboxResult<()>;

    /// Up to `limit` entries, ordered by `created_at` ascending (FIFO).
    /// Does not lock or delete; re-reads are safe.
    async fn fetch_pending(&self, limit: i64) -> OutboxResult<Vec<OutboxEntry>>;

    /// Remove the entry. Missing rows are not an error (idempotent).
    async fn delete(&self, outbox_id: Uuid) -> OutboxResult<()>;

    /// Atomically `retry_count += 1`.
    async fn increment_retry(&self, outbox_id: Uuid) -> OutboxResult<()>;

    /// Pending count and oldest-pending age in seconds (0 if none
    /// pending). Used for the processor's liveness metrics.
    async fn pending_stats(&self) -> OutboxResult<(i64, i64)>;
}

/// `sqlx`-backed implementation of [`OutboxRepository`] using PostgreSQL.
pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reset `published`-equivalent state (there is no published flag
    /// here — being present in the table at all means pending) for
    /// entries created since `ts`, for operational replay. Mirrors the
    /// teacher's `replay_since`/`replay_range` outbox-cli operations,
    /// adapted: because this table holds only pending rows, "replay"
    /// means re-inserting the envelope rather than clearing a flag, so
    /// this resets `retry_count` to give a leaked entry more attempts.
    pub async fn reset_retry_count_since(&self, ts: DateTime<Utc>) -> OutboxResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET retry_count = 0
            WHERE created_at >= $1
            "#,
        )
        .bind(ts)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn reset_retry_count_range(&self, from_id: Uuid, to_id: Uuid) -> OutboxResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET retry_count = 0
            WHERE outbox_id BETWEEN $1 AND $2
            "#,
        )
        .bind(from_id)
        .bind(to_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OutboxRepository for PgOutboxRepository {
    async fn insert(&self, envelope: &Envelope) -> OutboxResult<()> {
        let blob = serde_json::to_value(envelope)?;

        sqlx::query(
            r#"
            INSERT INTO outbox_events (outbox_id, envelope_blob, retry_count, created_at)
            VALUES ($1, $2, 0, $3)
            "#,
        )
        .bind(envelope.event_id)
        .bind(blob)
        .bind(envelope.ingested_at)
        .execute(&self.pool)
        .await?;

        debug!(event_id = %envelope.event_id, "envelope inserted into outbox");
        Ok(())
    }

    async fn fetch_pending(&self, limit: i64) -> OutboxResult<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT outbox_id, envelope_blob, retry_count, created_at
            FROM outbox_events
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let outbox_id: Uuid = row.try_get("outbox_id")?;
            let blob: serde_json::Value = row.try_get("envelope_blob")?;
            let envelope: Envelope = serde_json::from_value(blob)?;
            entries.push(OutboxEntry {
                outbox_id,
                envelope,
                retry_count: row.try_get("retry_count")?,
                created_at: row.try_get("created_at")?,
            });
        }

        debug!(count = entries.len(), "fetched pending outbox entries");
        Ok(entries)
    }

    async fn delete(&self, outbox_id: Uuid) -> OutboxResult<()> {
        sqlx::query("DELETE FROM outbox_events WHERE outbox_id = $1")
            .bind(outbox_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_retry(&self, outbox_id: Uuid) -> OutboxResult<()> {
        let result = sqlx::query(
            "UPDATE outbox_events SET retry_count = retry_count + 1 WHERE outbox_id = $1",
        )
        .bind(outbox_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::NotFound(outbox_id));
        }
        Ok(())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                COALESCE(EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT, 0) AS age_seconds
            FROM outbox_events
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((row.try_get("pending")?, row.try_get("age_seconds")?))
    }
}
