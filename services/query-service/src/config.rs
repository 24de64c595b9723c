//! Environment-driven configuration for the query service.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct QueryServiceConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
}

impl QueryServiceConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            host: env::var("QUERY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("QUERY_PORT")
                .unwrap_or_else(|_| "8081".to_string())
                .parse()
                .context("invalid QUERY_PORT")?,
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
        std::env::remove_var("QUERY_PORT");
        std::env::remove_var("QUERY_HOST");

        let config = QueryServiceConfig::from_env().unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.host, "0.0.0.0");

        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn missing_database_url_is_an_error() {
        std::env::remove_var("DATABASE_URL");
        assert!(QueryServiceConfig::from_env().is_err());
    }
}
