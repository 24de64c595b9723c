//! Environment-driven configuration for the ingest service.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct IngestServiceConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

impl IngestServiceConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            host: env::var("INGEST_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("INGEST_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("invalid INGEST_PORT")?,
            // Spec §5: HTTP graceful shutdown, default 30 s window.
            shutdown_timeout_secs: env::var("INGEST_SHUTDOWN_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("invalid INGEST_SHUTDOWN_TIMEOUT_SECS")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_when_unset() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/events");
        std::env::remove_var("INGEST_PORT");
        std::env::remove_var("INGEST_HOST");
        std::env::remove_var("INGEST_SHUTDOWN_TIMEOUT_SECS");

        let config = IngestServiceConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.shutdown_timeout_secs, 30);

        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn missing_database_url_is_an_error() {
        std::env::remove_var("DATABASE_URL");
        assert!(IngestServiceConfig::from_env().is_err());
    }
}
