//! Error types for the event store adapter.

use thiserror::Error;

pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Postgres unique-violation error code, used to distinguish a
/// duplicate-key insert from any other database failure (spec §6:
/// "Duplicate-key insert MUST be detectable and distinguishable from
/// other failures").
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum EventStoreError {
    /// The envelope's `event_id` already has a row. The outbox processor
    /// treats this as success (idempotent retry), per spec §4.4 S1.
    #[error("event {0} already present in event store")]
    DuplicateKey(uuid::Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("envelope error: {0}")]
    Envelope(#[from] event_envelope::EnvelopeError),
}

impl EventStoreError {
    pub(crate) fn from_insert_error(event_id: uuid::Uuid, err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return EventStoreError::DuplicateKey(event_id);
            }
        }
        EventStoreError::Database(err)
    }
}
