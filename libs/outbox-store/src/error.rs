//! Error types for the outbox store adapter.

use thiserror::Error;
use uuid::Uuid;

pub type OutboxResult<T> = Result<T, OutboxError>;

#[derive(Error, Debug)]
pub enum OutboxError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("outbox entry not found: {0}")]
    NotFound(Uuid),

    #[error("envelope decode error: {0}")]
    Envelope(#[from] event_envelope::EnvelopeError),

    #[error("envelope serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("notification channel error: {0}")]
    Listen(String),
}
