//! HTTP query boundary (spec §6): a thin read-through to the
//! projections table. Out of scope for the core per spec §1, but the
//! response shape is fixed here.

use std::str::FromStr;
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use error_handling::ServiceError;
use projection_store::{ProjectionRepository, ProjectionRow, ProjectionType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

pub struct AppState {
    pub projections: Arc<dyn ProjectionRepository>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProjectionResponse {
    pub projection_id: Uuid,
    pub projection_type: String,
    pub aggregate_id: String,
    pub state: serde_json::Value,
    pub last_event_id: Uuid,
    pub last_event_timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProjectionRow> for ProjectionResponse {
    fn from(row: ProjectionRow) -> Self {
        Self {
            projection_id: row.projection_id,
            projection_type: row.projection_type,
            aggregate_id: row.aggregate_id,
            state: row.state_blob,
            last_event_id: row.last_event_id,
            last_event_timestamp: row.last_event_timestamp,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListProjectionsResponse {
    pub projections: Vec<ProjectionResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn parse_projection_type(raw: &str) -> Result<ProjectionType, ServiceError> {
    ProjectionType::from_str(raw)
        .map_err(|_| ServiceError::ValidationError(format!("unknown projection type: {raw}")))
}

/// `GET /api/v1/projections/{type}` (spec §6): `limit` defaults to 20,
/// clamped to 100; `offset` defaults to 0.
pub async fn list_projections(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let projection_type = parse_projection_type(&path.into_inner())?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let (rows, total) = state
        .projections
        .list(projection_type, limit, offset)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;

    Ok(HttpResponse::Ok().json(ListProjectionsResponse {
        projections: rows.into_iter().map(ProjectionResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// `GET /api/v1/projections/{type}/{aggregate_id}` (spec §6): a single
/// projection, or `404` when none exists for that aggregate.
pub async fn get_projection(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ServiceError> {
    let (raw_type, aggregate_id) = path.into_inner();
    let projection_type = parse_projection_type(&raw_type)?;

    let row = state
        .projections
        .get(projection_type, &aggregate_id)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;

    match row {
        Some(row) => Ok(HttpResponse::Ok().json(ProjectionResponse::from(row))),
        None => Err(ServiceError::NotFound(format!(
            "no {raw_type} projection for aggregate {aggregate_id}"
        ))),
    }
}

/// `GET /health`: healthy once the DB pool answers `SELECT 1` indirectly
/// through a trivial projection list call would couple health to
/// business logic, so this checks the pool directly via `db_pool`.
pub async fn health(pool: web::Data<sqlx::PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({"status": "healthy"})),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": e.to_string(),
        })),
    }
}
