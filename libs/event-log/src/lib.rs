//! The Event Log: an append-only, partitioned, durable log with
//! semantics identical to a Kafka-compatible broker — topics, ordered
//! partitions, consumer-group offset commits. The platform holds only
//! producer/consumer capabilities; the broker owns the log itself.
//!
//! See spec §4.4 "Topic selection" and §4.5 for how the two core
//! subsystems use this adapter.

mod consumer;
mod error;
mod producer;
mod topic;

pub use consumer::{ConsumerSettings, KafkaEventLogConsumer, RawRecord};
pub use error::{EventLogError, EventLogResult};
pub use producer::{EventLog, KafkaEventLog};
pub use topic::{topic_for, DEFAULT_TOPICS};
