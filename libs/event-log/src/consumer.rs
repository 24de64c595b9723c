//! Consumer side of the Event Log adapter. Auto-commit is disabled;
//! callers fetch a batch, process it, then explicitly commit — so a
//! crash mid-batch replays the un-committed suffix (spec §4.5).

use crate::error::{EventLogError, EventLogResult};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// A single record pulled off the log, not yet decoded. Decoding is the
/// projection updater's job (its dispatch loop is what needs to treat a
/// bad payload as "log and skip", not this adapter).
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub payload: Vec<u8>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

pub struct ConsumerSettings {
    pub brokers: String,
    pub group_id: String,
    pub topics: Vec<String>,
}

/// `rdkafka`-backed consumer. One cooperative loop per consumer (spec
/// §5: "no worker fan-out because partition-level ordering must be
/// preserved per aggregate").
pub struct KafkaEventLogConsumer {
    consumer: StreamConsumer,
}

impl KafkaEventLogConsumer {
    pub fn new(settings: &ConsumerSettings) -> EventLogResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &settings.group_id)
            .set("bootstrap.servers", &settings.brokers)
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        let topics: Vec<&str> = settings.topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics)?;

        Ok(Self { consumer })
    }

    /// Fetch a batch of records, bounded by wall-clock `poll_timeout`.
    /// Returns as soon as the timeout elapses, even with an empty or
    /// partial batch — fetch errors are logged and the loop continues,
    /// per spec ("the library is responsible for offset advancement and
    /// rebalance safety").
    pub async fn poll_batch(&self, poll_timeout: Duration) -> Vec<RawRecord> {
        let deadline = tokio::time::Instant::now() + poll_timeout;
        let mut batch = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, self.consumer.recv()).await {
                Ok(Ok(message)) => {
                    let payload = message.payload().map(|p| p.to_vec()).unwrap_or_default();
                    batch.push(RawRecord {
                        payload,
                        topic: message.topic().to_string(),
                        partition: message.partition(),
                        offset: message.offset(),
                    });
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "event log fetch error, continuing");
                    break;
                }
                Err(_elapsed) => break,
            }
        }

        batch
    }

    /// Commit the highest offset seen per topic-partition in `records`.
    /// Called after the whole batch has been dispatched, never before
    /// (at-least-once consumption per spec §4.5).
    pub async fn commit(&self, records: &[RawRecord]) -> EventLogResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut highest: HashMap<(String, i32), i64> = HashMap::new();
        for record in records {
            let key = (record.topic.clone(), record.partition);
            let entry = highest.entry(key).or_insert(record.offset);
            if record.offset > *entry {
                *entry = record.offset;
            }
        }

        let mut tpl = TopicPartitionList::new();
        for ((topic, partition), offset) in highest {
            tpl.add_partition_offset(&topic, partition, Offset::Offset(offset + 1))
                .map_err(EventLogError::Kafka)?;
        }

        self.consumer.commit(&tpl, CommitMode::Sync)?;
        Ok(())
    }
}
