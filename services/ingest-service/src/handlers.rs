//! HTTP ingest boundary (spec §4.2, §6). Request parsing/validation is
//! out of scope for the core per spec §1, but the shape is fixed here:
//! validate field presence, construct the envelope, insert one outbox
//! row, and return before any downstream fan-out has happened.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use error_handling::ServiceError;
use event_envelope::{Envelope, EnvelopeMetadata, PlatformClock};
use outbox_store::OutboxRepository;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub event_type: String,
    pub aggregate_id: String,
    pub payload: serde_json::Value,
    pub event_time: Option<DateTime<Utc>>,
    pub trace_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub event_id: Uuid,
    pub status: &'static str,
}

pub struct AppState {
    pub outbox: Arc<dyn OutboxRepository>,
    pub clock: Arc<dyn PlatformClock>,
    pub db_pool: PgPool,
}

/// `POST /api/v1/events` (spec §6). Returns `202 Accepted` with the
/// generated `event_id` before any fan-out has happened — no
/// cross-table transaction is required, the envelope lives in the
/// outbox until the outbox processor makes it durable elsewhere.
pub async fn ingest_event(
    state: web::Data<AppState>,
    body: web::Json<IngestRequest>,
) -> Result<HttpResponse, ServiceError> {
    let request = body.into_inner();

    if request.event_type.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "event_type must not be empty".to_string(),
        ));
    }
    if request.aggregate_id.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "aggregate_id must not be empty".to_string(),
        ));
    }
    if request.payload.is_null() {
        return Err(ServiceError::ValidationError(
            "payload must not be empty".to_string(),
        ));
    }

    let envelope = Envelope::new(
        request.event_type,
        request.aggregate_id,
        request.payload,
        EnvelopeMetadata {
            trace_id: request.trace_id,
            source: Some("ingest-service".to_string()),
            schema_version: 1,
        },
        request.event_time,
        state.clock.as_ref(),
    );

    state.outbox.insert(&envelope).await.map_err(|e| {
        error!(event_id = %envelope.event_id, error = %e, "failed to insert outbox entry");
        ServiceError::Database(e.to_string())
    })?;

    debug!(event_id = %envelope.event_id, "event accepted into outbox");

    Ok(HttpResponse::Accepted().json(IngestResponse {
        event_id: envelope.event_id,
        status: "accepted",
    }))
}

/// `GET /health` (spec §6): healthy once the DB pool answers `SELECT 1`.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({"status": "healthy"})),
        Err(e) => {
            error!(error = %e, "health check database probe failed");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }))
        }
    }
}
