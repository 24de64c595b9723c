//! The Projections table: a materialized read model keyed by
//! `(projection_type, aggregate_id)`, owned exclusively by the
//! projection updater for writes. Query-service reads through the same
//! adapter (spec §3 "Ownership", §4.5 "Projection upsert — LWW rule").

mod error;

pub use error::{ProjectionError, ProjectionResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Embedded migrations for the `projections` table, relative to this
/// crate's manifest directory. Run by the projection updater at
/// startup — the sole writer, per spec's ownership rule.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// The closed enumeration of projection types this deployment knows how
/// to materialize and serve (spec §4.5 "Built-in handlers", §6 "400
/// when `{type}` is not in the closed enumeration"). Adding a
/// projection type means adding a variant here, a handler in the
/// projection updater's dispatch registry, and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionType {
    SensorState,
    UserSession,
}

impl ProjectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionType::SensorState => "sensor_state",
            ProjectionType::UserSession => "user_session",
        }
    }
}

impl std::fmt::Display for ProjectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectionType {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensor_state" => Ok(ProjectionType::SensorState),
            "user_session" => Ok(ProjectionType::UserSession),
            other => Err(ProjectionError::UnknownType(other.to_string())),
        }
    }
}

/// A materialized projection row (spec §3 "Projection Row").
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProjectionRow {
    pub projection_id: Uuid,
    pub projection_type: String,
    pub aggregate_id: String,
    pub state_blob: serde_json::Value,
    pub last_event_id: Uuid,
    pub last_event_timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether an upsert attempt actually replaced the stored state, or was
/// rejected by the LWW rule as strictly-older-or-tied input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Applied,
    Stale,
}

#[async_trait]
pub trait ProjectionRepository: Send + Sync {
    /// Insert on first write for the `(projection_type, aggregate_id)`
    /// pair; on conflict, replace iff the incoming `(event_time,
    /// event_id)` strictly exceeds the stored one (spec §4.5 LWW rule).
    async fn upsert_if_newer(
        &self,
        projection_type: ProjectionType,
        aggregate_id: &str,
        state_blob: serde_json::Value,
        last_event_id: Uuid,
        last_event_timestamp: DateTime<Utc>,
    ) -> ProjectionResult<UpsertOutcome>;

    async fn get(
        &self,
        projection_type: ProjectionType,
        aggregate_id: &str,
    ) -> ProjectionResult<Option<ProjectionRow>>;

    /// Page through projections of one type, ordered by `aggregate_id`
    /// for stable pagination. Returns the page and the total row count
    /// for that type (spec §6 query response shape).
    async fn list(
        &self,
        projection_type: ProjectionType,
        limit: i64,
        offset: i64,
    ) -> ProjectionResult<(Vec<ProjectionRow>, i64)>;
}

pub struct PostgresProjectionRepository {
    pool: PgPool,
}

impl PostgresProjectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectionRepository for PostgresProjectionRepository {
    async fn upsert_if_newer(
        &self,
        projection_type: ProjectionType,
        aggregate_id: &str,
        state_blob: serde_json::Value,
        last_event_id: Uuid,
        last_event_timestamp: DateTime<Utc>,
    ) -> ProjectionResult<UpsertOutcome> {
        // The ON CONFLICT ... WHERE guard performs the LWW comparison
        // atomically inside Postgres: the update (or insert-on-first-
        // write) only takes effect when the incoming (event_time,
        // event_id) tuple strictly exceeds the stored one. When it
        // doesn't, the statement affects no row and RETURNING yields
        // nothing, which is how the caller distinguishes Applied from
        // Stale without a separate read-then-write race.
        let applied = sqlx::query(
            r#"
            INSERT INTO projections (
                projection_id, projection_type, aggregate_id, state_blob,
                last_event_id, last_event_timestamp, updated_at
            )
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, NOW())
            ON CONFLICT (projection_type, aggregate_id) DO UPDATE
            SET state_blob = EXCLUDED.state_blob,
                last_event_id = EXCLUDED.last_event_id,
                last_event_timestamp = EXCLUDED.last_event_timestamp,
                updated_at = NOW()
            WHERE (EXCLUDED.last_event_timestamp, EXCLUDED.last_event_id)
                > (projections.last_event_timestamp, projections.last_event_id)
            RETURNING projection_id
            "#,
        )
        .bind(projection_type.as_str())
        .bind(aggregate_id)
        .bind(state_blob)
        .bind(last_event_id)
        .bind(last_event_timestamp)
        .fetch_optional(&self.pool)
        .await?;

        Ok(if applied.is_some() {
            UpsertOutcome::Applied
        } else {
            UpsertOutcome::Stale
        })
    }

    async fn get(
        &self,
        projection_type: ProjectionType,
        aggregate_id: &str,
    ) -> ProjectionResult<Option<ProjectionRow>> {
        let row = sqlx::query_as::<_, ProjectionRow>(
            r#"
            SELECT projection_id, projection_type, aggregate_id, state_blob,
                   last_event_id, last_event_timestamp, updated_at
            FROM projections
            WHERE projection_type = $1 AND aggregate_id = $2
            "#,
        )
        .bind(projection_type.as_str())
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list(
        &self,
        projection_type: ProjectionType,
        limit: i64,
        offset: i64,
    ) -> ProjectionResult<(Vec<ProjectionRow>, i64)> {
        let rows = sqlx::query_as::<_, ProjectionRow>(
            r#"
            SELECT projection_id, projection_type, aggregate_id, state_blob,
                   last_event_id, last_event_timestamp, updated_at
            FROM projections
            WHERE projection_type = $1
            ORDER BY aggregate_id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(projection_type.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total_row = sqlx::query("SELECT COUNT(*)::BIGINT AS count FROM projections WHERE projection_type = $1")
            .bind(projection_type.as_str())
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = total_row.try_get("count")?;

        Ok((rows, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_type_round_trips_through_str() {
        use std::str::FromStr;
        assert_eq!(ProjectionType::SensorState.as_str(), "sensor_state");
        assert_eq!(
            ProjectionType::from_str("sensor_state").unwrap(),
            ProjectionType::SensorState
        );
        assert_eq!(
            ProjectionType::from_str("user_session").unwrap(),
            ProjectionType::UserSession
        );
    }

    #[test]
    fn unknown_projection_type_is_rejected() {
        use std::str::FromStr;
        let err = ProjectionType::from_str("billing_ledger").unwrap_err();
        assert!(matches!(err, ProjectionError::UnknownType(_)));
    }
}
