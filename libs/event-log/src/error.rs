//! Error types for the event log adapter.

use thiserror::Error;

pub type EventLogResult<T> = Result<T, EventLogError>;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("envelope error: {0}")]
    Envelope(#[from] event_envelope::EnvelopeError),
}
