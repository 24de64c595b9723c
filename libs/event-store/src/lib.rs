//! The Event Store: an append-only, source-of-truth table holding one
//! row per envelope, keyed by `event_id`. Owned by the broker of the
//! outbox processor's writes — never updated or deleted by the core.
//!
//! See spec §3 ("Event Store Row") and §4.4 state S1.

mod error;

pub use error::{EventStoreError, EventStoreResult};

use async_trait::async_trait;
use event_envelope::Envelope;
use sqlx::{PgPool, Row};
use tracing::debug;

/// Embedded migrations for the `event_store` table, relative to this
/// crate's manifest directory. Run by whichever binary owns the table
/// (the outbox processor) at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Adapter contract for the event store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append-only insert keyed by `event_id`. Returns
    /// [`EventStoreError::DuplicateKey`] (not a generic database error)
    /// when the row already exists, so the outbox processor can treat
    /// it as an idempotent no-op.
    async fn insert(&self, envelope: &Envelope) -> EventStoreResult<()>;

    /// Total row count, exposed for end-to-end test assertions (spec §8
    /// scenario 1: "event_store row count +1").
    async fn count(&self) -> EventStoreResult<i64>;
}

pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn insert(&self, envelope: &Envelope) -> EventStoreResult<()> {
        let metadata = serde_json::to_value(&envelope.metadata)
            .map_err(|e| EventStoreError::Envelope(event_envelope::EnvelopeError::Decode(e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO event_store (
                event_id, event_type, aggregate_id, event_time, ingested_at, payload, metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(envelope.event_id)
        .bind(&envelope.event_type)
        .bind(&envelope.aggregate_id)
        .bind(envelope.event_time)
        .bind(envelope.ingested_at)
        .bind(&envelope.payload)
        .bind(metadata)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(event_id = %envelope.event_id, "event appended to event store");
                Ok(())
            }
            Err(err) => Err(EventStoreError::from_insert_error(envelope.event_id, err)),
        }
    }

    async fn count(&self) -> EventStoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*)::BIGINT AS count FROM event_store")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }
}
