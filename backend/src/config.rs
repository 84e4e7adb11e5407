//! Configuration management for the Repair Shop Management backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with RSM__ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Financial reporting configuration
    pub reporting: ReportingConfig,

    /// Outbound notification webhook
    pub notifications: NotificationConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,

    /// Per-request deadline; in-flight transactions roll back when it fires
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for verifying JWT tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportingConfig {
    /// Gross-profit target per technician per day
    pub daily_quota: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Empty disables the webhook
    pub webhook_url: String,

    /// HMAC-SHA256 key for the X-Signature header
    pub webhook_secret: String,

    /// Upper bound on one webhook delivery, connect included
    pub webhook_timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            webhook_secret: String::new(),
            webhook_timeout_secs: 5,
        }
    }
}

impl NotificationConfig {
    pub fn webhook(&self) -> Option<(&str, &str)> {
        if self.webhook_url.trim().is_empty() {
            None
        } else {
            Some((self.webhook_url.as_str(), self.webhook_secret.as_str()))
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("RSM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("reporting.daily_quota", shared::DAILY_QUOTA.to_string())?
            .set_default("notifications.webhook_url", "")?
            .set_default("notifications.webhook_secret", "")?
            .set_default("notifications.webhook_timeout_secs", 5)?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (RSM__ prefix)
            .add_source(
                Environment::with_prefix("RSM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_disabled_when_url_blank() {
        let config = NotificationConfig::default();
        assert!(config.webhook().is_none());

        let config = NotificationConfig {
            webhook_url: "https://hooks.example.com/shop".to_string(),
            webhook_secret: "s3cret".to_string(),
            ..Default::default()
        };
        assert_eq!(config.webhook(), Some(("https://hooks.example.com/shop", "s3cret")));
    }
}
