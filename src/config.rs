use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

// ============================================================================
// Configuration - loaded from environment variables
// ============================================================================
//
// DATABASE_URL              Postgres URL; unset runs on the in-memory store
// DATABASE_MAX_CONNECTIONS  pool size (default 5)
// METRICS_ENABLED           serve /metrics and /health (default true)
// METRICS_PORT              metrics server port (default 9090)
// LOG_FILTER                tracing filter when RUST_LOG is unset
//
// ============================================================================

pub const DEFAULT_LOG_FILTER: &str = "info,event_registration=debug";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// `None` selects the in-memory store
    pub database: Option<DatabaseConfig>,
    pub metrics: MetricsConfig,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            }),
            None => None,
        };

        Ok(Self {
            database,
            metrics: MetricsConfig {
                enabled: parse_or(&lookup, "METRICS_ENABLED", true)?,
                port: parse_or(&lookup, "METRICS_PORT", 9090)?,
            },
            log_filter: lookup("LOG_FILTER").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
