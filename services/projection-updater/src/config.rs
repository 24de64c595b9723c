//! Environment-driven configuration for the projection updater.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProjectionUpdaterConfig {
    pub database_url: String,
    pub kafka_brokers: String,
    pub consumer_group: String,
    pub subscribed_topics: Vec<String>,
    pub poll_timeout: Duration,
    pub metrics_port: u16,
}

impl ProjectionUpdaterConfig {
    pub fn from_env() -> Result<Self> {
        let subscribed_topics = env::var("PROJECTION_SUBSCRIBED_TOPICS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|topics| !topics.is_empty())
            .unwrap_or_else(|| {
                event_log::DEFAULT_TOPICS
                    .iter()
                    .map(|t| t.to_string())
                    .collect()
            });

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            kafka_brokers: env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            consumer_group: env::var("PROJECTION_CONSUMER_GROUP")
                .unwrap_or_else(|_| "event-handler".to_string()),
            subscribed_topics,
            poll_timeout: Duration::from_millis(
                env::var("PROJECTION_POLL_TIMEOUT_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .context("invalid PROJECTION_POLL_TIMEOUT_MS")?,
            ),
            metrics_port: env::var("PROJECTION_METRICS_PORT")
                .unwrap_or_else(|_| "9101".to_string())
                .parse()
                .context("invalid PROJECTION_METRICS_PORT")?,
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
        std::env::remove_var("PROJECTION_SUBSCRIBED_TOPICS");
        std::env::remove_var("PROJECTION_CONSUMER_GROUP");
        std::env::remove_var("PROJECTION_POLL_TIMEOUT_MS");

        let config = ProjectionUpdaterConfig::from_env().unwrap();
        assert_eq!(config.consumer_group, "event-handler");
        assert_eq!(config.poll_timeout, Duration::from_millis(1000));
        assert_eq!(
            config.subscribed_topics,
            vec!["sensor-events", "user-actions", "system-events"]
        );

        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn subscribed_topics_parse_from_comma_list() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/events");
        std::env::set_var("PROJECTION_SUBSCRIBED_TOPICS", "sensor-events, user-actions");

        let config = ProjectionUpdaterConfig::from_env().unwrap();
        assert_eq!(config.subscribed_topics, vec!["sensor-events", "user-actions"]);

        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("PROJECTION_SUBSCRIBED_TOPICS");
    }

    #[test]
    #[serial]
    fn missing_database_url_is_an_error() {
        std::env::remove_var("DATABASE_URL");
        assert!(ProjectionUpdaterConfig::from_env().is_err());
    }
}
