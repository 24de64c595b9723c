//! The immutable event record exchanged between every stage of the
//! platform: ingest, outbox, event store, and event log all move the
//! same wire-format bytes.

pub mod clock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use clock::{FixedClock, PlatformClock, RealClock, ReplayClock};

/// Trace/provenance fields carried alongside every envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvelopeMetadata {
    pub trace_id: Option<String>,
    pub source: Option<String>,
    pub schema_version: u32,
}

/// The canonical, immutable event record.
///
/// `event_id` is a UUIDv7-class identifier: monotonically sortable by
/// creation time, which is what lets the projection upsert rule break
/// `event_time` ties deterministically (see [`crate`] docs and the LWW
/// rule in the projection updater).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub aggregate_id: String,
    pub event_time: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub metadata: EnvelopeMetadata,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Envelope {
    /// Construct a new envelope, stamping `ingested_at` from the given
    /// clock and a fresh time-ordered `event_id`.
    ///
    /// If the caller did not supply `event_time`, it falls back to
    /// `ingested_at` so that every envelope has a total, comparable
    /// ordering key downstream (the open question in spec §9 is decided
    /// in favor of this fallback).
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        payload: serde_json::Value,
        metadata: EnvelopeMetadata,
        event_time: Option<DateTime<Utc>>,
        clock: &dyn PlatformClock,
    ) -> Self {
        let ingested_at = clock.now();
        Self {
            event_id: Uuid::now_v7(),
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            event_time: event_time.unwrap_or(ingested_at),
            ingested_at,
            payload,
            metadata,
        }
    }

    /// Canonical wire/at-rest encoding. Used verbatim by the outbox,
    /// event store, and event log adapters — whatever bytes `encode`
    /// produces, `decode` must accept (round-trip law).
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Dispatch/partition key used by both the outbox processor's topic
    /// derivation and the projection updater's dispatch registry: the
    /// dotted prefix of `event_type` up to (not including) the first
    /// `.`, or the whole string if there is no `.`.
    pub fn type_prefix(&self) -> &str {
        self.event_type
            .split_once('.')
            .map(|(prefix, _)| prefix)
            .unwrap_or(&self.event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_is_byte_identical_on_reencode() {
        let clock = RealClock;
        let envelope = Envelope::new(
            "sensor.reading",
            "device-001",
            json!({"value": 70.0, "unit": "f"}),
            EnvelopeMetadata {
                trace_id: Some("abc".into()),
                source: Some("test".into()),
                schema_version: 1,
            },
            None,
            &clock,
        );

        let encoded = envelope.encode().unwrap();
        let decoded = Envelope::decode(&encoded).unwrap();
        assert_eq!(envelope, decoded);
        assert_eq!(decoded.encode().unwrap(), encoded);
    }

    #[test]
    fn event_time_falls_back_to_ingested_at_when_absent() {
        let clock = FixedClock::new(Utc::now());
        let envelope = Envelope::new(
            "user.login",
            "user-42",
            json!({}),
            EnvelopeMetadata::default(),
            None,
            &clock,
        );
        assert_eq!(envelope.event_time, envelope.ingested_at);
    }

    #[test]
    fn event_time_is_preserved_when_supplied() {
        let clock = FixedClock::new(Utc::now());
        let caller_time = clock.now() - chrono::Duration::minutes(10);
        let envelope = Envelope::new(
            "user.login",
            "user-42",
            json!({}),
            EnvelopeMetadata::default(),
            Some(caller_time),
            &clock,
        );
        assert_eq!(envelope.event_time, caller_time);
        assert_ne!(envelope.event_time, envelope.ingested_at);
    }

    #[test]
    fn type_prefix_splits_on_first_dot() {
        let clock = RealClock;
        let e = Envelope::new(
            "sensor.reading.v2",
            "d1",
            json!({}),
            EnvelopeMetadata::default(),
            None,
            &clock,
        );
        assert_eq!(e.type_prefix(), "sensor");
    }

    #[test]
    fn type_prefix_falls_back_to_whole_string_without_dot() {
        let clock = RealClock;
        let e = Envelope::new("heartbeat", "d1", json!({}), EnvelopeMetadata::default(), None, &clock);
        assert_eq!(e.type_prefix(), "heartbeat");
    }

    #[test]
    fn decode_rejects_malformed_bytes() {
        let err = Envelope::decode(b"not json").unwrap_err();
        assert!(matches!(err, EnvelopeError::Decode(_)));
    }
}
