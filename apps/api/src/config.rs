use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which store implementation backs the ledger, orders and documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl StorageBackend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => bail!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    /// Required only for the Postgres backend.
    pub database_url: Option<String>,
    pub pipeline_webhook_url: String,
    pub pipeline_timeout: Duration,
    /// Shared secret the payment notifier must echo in `x-webhook-token`.
    pub payment_webhook_token: Option<String>,
    pub reconcile_interval: Duration,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage_backend = StorageBackend::parse(
            &std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "postgres".to_string()),
        )?;

        let database_url = match storage_backend {
            StorageBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StorageBackend::Memory => std::env::var("DATABASE_URL").ok(),
        };

        Ok(Config {
            storage_backend,
            database_url,
            pipeline_webhook_url: require_env("PIPELINE_WEBHOOK_URL")?,
            pipeline_timeout: Duration::from_secs(parse_env("PIPELINE_TIMEOUT_SECS", 300)?),
            payment_webhook_token: std::env::var("PAYMENT_WEBHOOK_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            reconcile_interval: Duration::from_secs(parse_env("RECONCILE_INTERVAL_SECS", 60)?),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parses_known_values() {
        assert_eq!(
            StorageBackend::parse("Postgres").unwrap(),
            StorageBackend::Postgres
        );
        assert_eq!(
            StorageBackend::parse(" memory ").unwrap(),
            StorageBackend::Memory
        );
    }

    #[test]
    fn test_storage_backend_rejects_unknown() {
        assert!(StorageBackend::parse("sqlite").is_err());
    }
}
