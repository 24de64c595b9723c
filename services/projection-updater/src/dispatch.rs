//! Dispatch Registry and built-in handlers (spec §4.5). `event_type`
//! prefix selects a handler; first match wins; unmatched prefixes are
//! silently skipped (an observation, not an error).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use event_envelope::Envelope;
use projection_store::{ProjectionRepository, ProjectionType, UpsertOutcome};
use thiserror::Error;

/// What a handler wants written into the projection for this envelope.
pub struct ProjectionWrite {
    pub projection_type: ProjectionType,
    pub aggregate_id: String,
    pub state_blob: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler failed for event_type {event_type}: {reason}")]
    Failed { event_type: String, reason: String },
}

/// `Handle(envelope) → ok | error` (spec §4.5 "Handler contract").
#[async_trait]
pub trait ProjectionHandler: Send + Sync {
    async fn handle(&self, envelope: &Envelope) -> Result<ProjectionWrite, HandlerError>;
}

/// `sensor.` → `sensor_state`, payload written verbatim.
pub struct SensorHandler;

#[async_trait]
impl ProjectionHandler for SensorHandler {
    async fn handle(&self, envelope: &Envelope) -> Result<ProjectionWrite, HandlerError> {
        Ok(ProjectionWrite {
            projection_type: ProjectionType::SensorState,
            aggregate_id: envelope.aggregate_id.clone(),
            state_blob: envelope.payload.clone(),
        })
    }
}

/// `user.` → `user_session`, payload written verbatim.
pub struct UserHandler;

#[async_trait]
impl ProjectionHandler for UserHandler {
    async fn handle(&self, envelope: &Envelope) -> Result<ProjectionWrite, HandlerError> {
        Ok(ProjectionWrite {
            projection_type: ProjectionType::UserSession,
            aggregate_id: envelope.aggregate_id.clone(),
            state_blob: envelope.payload.clone(),
        })
    }
}

/// An explicit registry keyed by prefix string, not dynamic dispatch
/// over a class hierarchy (spec §9 "Dispatch table vs inheritance").
/// Prefixes are expected to be disjoint; iteration order does not
/// matter for a well-formed registry, but lookup is by exact prefix key
/// so "first match wins" is trivially satisfied.
pub struct DispatchRegistry {
    handlers: HashMap<&'static str, Arc<dyn ProjectionHandler>>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(mut self, prefix: &'static str, handler: Arc<dyn ProjectionHandler>) -> Self {
        self.handlers.insert(prefix, handler);
        self
    }

    /// The platform's built-in registry: `sensor.` and `user.` (spec
    /// §4.5 "Built-in handlers").
    pub fn with_builtin_handlers() -> Self {
        Self::new()
            .register("sensor", Arc::new(SensorHandler))
            .register("user", Arc::new(UserHandler))
    }

    pub fn resolve(&self, event_type: &str) -> Option<Arc<dyn ProjectionHandler>> {
        let prefix = event_type.split_once('.').map(|(p, _)| p).unwrap_or(event_type);
        self.handlers.get(prefix).cloned()
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::with_builtin_handlers()
    }
}

/// Outcome of dispatching one decoded envelope, for the consumer loop's
/// logging and metrics.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// No handler registered for this event type's prefix; not an
    /// error, only an observation (spec §4.5).
    Unmatched,
    /// LWW accepted the incoming event as newer.
    Applied,
    /// LWW rejected the incoming event as stale (out-of-order arrival).
    Stale,
    /// The handler itself returned an error (spec §7 `HandlerError`).
    HandlerError(HandlerError),
    /// The projection repository call failed (storage-layer failure,
    /// distinct from a handler's business-logic error).
    RepositoryError(String),
}

/// Resolve a handler for `envelope`, run it, and apply the LWW upsert.
/// This is the core logic exercised by unit tests against in-memory
/// fakes (spec §8 scenarios 3 and 6 need no real broker).
pub async fn dispatch_and_apply(
    registry: &DispatchRegistry,
    projections: &Arc<dyn ProjectionRepository>,
    envelope: &Envelope,
) -> DispatchOutcome {
    let Some(handler) = registry.resolve(&envelope.event_type) else {
        return DispatchOutcome::Unmatched;
    };

    let write = match handler.handle(envelope).await {
        Ok(write) => write,
        Err(e) => return DispatchOutcome::HandlerError(e),
    };

    match projections
        .upsert_if_newer(
            write.projection_type,
            &write.aggregate_id,
            write.state_blob,
            envelope.event_id,
            envelope.event_time,
        )
        .await
    {
        Ok(UpsertOutcome::Applied) => DispatchOutcome::Applied,
        Ok(UpsertOutcome::Stale) => DispatchOutcome::Stale,
        Err(e) => DispatchOutcome::RepositoryError(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use event_envelope::{EnvelopeMetadata, RealClock};
    use projection_store::{ProjectionResult, ProjectionRow};
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// In-memory fake standing in for the Postgres-backed repository,
    /// implementing the same LWW comparison the real adapter's SQL
    /// performs.
    #[derive(Default)]
    struct FakeProjectionRepository {
        rows: Mutex<HashMap<(String, String), ProjectionRow>>,
    }

    #[async_trait]
    impl ProjectionRepository for FakeProjectionRepository {
        async fn upsert_if_newer(
            &self,
            projection_type: ProjectionType,
            aggregate_id: &str,
            state_blob: serde_json::Value,
            last_event_id: Uuid,
            last_event_timestamp: DateTime<Utc>,
        ) -> ProjectionResult<UpsertOutcome> {
            let key = (projection_type.as_str().to_string(), aggregate_id.to_string());
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&key) {
                Some(existing)
                    if (existing.last_event_timestamp, existing.last_event_id)
                        >= (last_event_timestamp, last_event_id) =>
                {
                    Ok(UpsertOutcome::Stale)
                }
                _ => {
                    rows.insert(
                        key,
                        ProjectionRow {
                            projection_id: Uuid::new_v4(),
                            projection_type: projection_type.as_str().to_string(),
                            aggregate_id: aggregate_id.to_string(),
                            state_blob,
                            last_event_id,
                            last_event_timestamp,
                            updated_at: Utc::now(),
                        },
                    );
                    Ok(UpsertOutcome::Applied)
                }
            }
        }

        async fn get(
            &self,
            projection_type: ProjectionType,
            aggregate_id: &str,
        ) -> ProjectionResult<Option<ProjectionRow>> {
            let key = (projection_type.as_str().to_string(), aggregate_id.to_string());
            Ok(self.rows.lock().unwrap().get(&key).cloned())
        }

        async fn list(
            &self,
            _projection_type: ProjectionType,
            _limit: i64,
            _offset: i64,
        ) -> ProjectionResult<(Vec<ProjectionRow>, i64)> {
            Ok((Vec::new(), 0))
        }
    }

    fn envelope_at(
        event_type: &str,
        aggregate_id: &str,
        value: f64,
        event_time: DateTime<Utc>,
    ) -> Envelope {
        let clock = RealClock;
        Envelope::new(
            event_type,
            aggregate_id,
            json!({"value": value}),
            EnvelopeMetadata::default(),
            Some(event_time),
            &clock,
        )
    }

    #[tokio::test]
    async fn unknown_event_type_is_unmatched_and_not_an_error() {
        let registry = DispatchRegistry::with_builtin_handlers();
        let projections: Arc<dyn ProjectionRepository> =
            Arc::new(FakeProjectionRepository::default());
        let envelope = envelope_at("billing.charge", "invoice-1", 1.0, Utc::now());

        let outcome = dispatch_and_apply(&registry, &projections, &envelope).await;
        assert!(matches!(outcome, DispatchOutcome::Unmatched));
    }

    #[tokio::test]
    async fn out_of_order_arrival_keeps_the_later_event_time() {
        let registry = DispatchRegistry::with_builtin_handlers();
        let projections: Arc<dyn ProjectionRepository> =
            Arc::new(FakeProjectionRepository::default());

        let t0 = Utc::now();
        let later = envelope_at("sensor.reading", "dev-X", 2.0, t0 + ChronoDuration::minutes(10));
        let earlier = envelope_at("sensor.reading", "dev-X", 1.0, t0);

        let first = dispatch_and_apply(&registry, &projections, &later).await;
        assert!(matches!(first, DispatchOutcome::Applied));

        let second = dispatch_and_apply(&registry, &projections, &earlier).await;
        assert!(matches!(second, DispatchOutcome::Stale));

        let stored = projections
            .get(ProjectionType::SensorState, "dev-X")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.state_blob["value"], 2.0);
        assert_eq!(stored.last_event_id, later.event_id);
    }

    #[tokio::test]
    async fn sensor_and_user_prefixes_route_to_distinct_projection_types() {
        let registry = DispatchRegistry::with_builtin_handlers();
        let projections: Arc<dyn ProjectionRepository> =
            Arc::new(FakeProjectionRepository::default());

        let sensor = envelope_at("sensor.reading", "device-001", 70.0, Utc::now());
        dispatch_and_apply(&registry, &projections, &sensor).await;

        let user = envelope_at("user.login", "user-42", 0.0, Utc::now());
        dispatch_and_apply(&registry, &projections, &user).await;

        assert!(projections
            .get(ProjectionType::SensorState, "device-001")
            .await
            .unwrap()
            .is_some());
        assert!(projections
            .get(ProjectionType::UserSession, "user-42")
            .await
            .unwrap()
            .is_some());
    }
}
