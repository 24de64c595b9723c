//! Error types for the projection store adapter.

use thiserror::Error;

pub type ProjectionResult<T> = Result<T, ProjectionError>;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown projection type: {0}")]
    UnknownType(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
