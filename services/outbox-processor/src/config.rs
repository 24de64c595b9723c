//! Environment-driven configuration for the outbox processor.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OutboxProcessorConfig {
    pub database_url: String,
    pub kafka_brokers: String,
    pub worker_count: usize,
    pub batch_size: i64,
    pub max_retries: i32,
    pub poll_interval: Duration,
    pub metrics_port: u16,
}

impl OutboxProcessorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            kafka_brokers: env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            worker_count: env::var("OUTBOX_WORKER_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("invalid OUTBOX_WORKER_COUNT")?,
            batch_size: env::var("OUTBOX_BATCH_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("invalid OUTBOX_BATCH_SIZE")?,
            max_retries: env::var("OUTBOX_MAX_RETRIES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("invalid OUTBOX_MAX_RETRIES")?,
            poll_interval: Duration::from_secs(
                env::var("OUTBOX_POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .context("invalid OUTBOX_POLL_INTERVAL_SECS")?,
            ),
            metrics_port: env::var("OUTBOX_METRICS_PORT")
                .unwrap_or_else(|_| "9100".to_string())
                .parse()
                .context("invalid OUTBOX_METRICS_PORT")?,
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
        std::env::remove_var("OUTBOX_WORKER_COUNT");
        std::env::remove_var("OUTBOX_BATCH_SIZE");
        std::env::remove_var("OUTBOX_MAX_RETRIES");
        std::env::remove_var("OUTBOX_POLL_INTERVAL_SECS");

        let config = OutboxProcessorConfig::from_env().unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.poll_interval, Duration::from_secs(5));

        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn missing_database_url_is_an_error() {
        std::env::remove_var("DATABASE_URL");
        assert!(OutboxProcessorConfig::from_env().is_err());
    }
}
