use std::str::FromStr;

use anyhow::Context;

/// Server configuration loaded from environment variables.
///
/// Provider credentials (`KLING_*`, `VOLCENGINE_*`, `DASHSCOPE_*`,
/// `SORA2_*`) and object storage (`S3_*`) are read by their own config
/// structs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background jobs get to stop after shutdown starts (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    /// Path of the JSON model catalog.
    pub models_config_path: String,
    /// Interval of the asset archive retry loop (default: `60`).
    pub archive_retry_interval_secs: u64,
    /// Archive jobs claimed per retry cycle (default: `20`).
    pub archive_batch_size: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                    |
    /// |-------------------------------|----------------------------|
    /// | `HOST`                        | `0.0.0.0`                  |
    /// | `PORT`                        | `3000`                     |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                       |
    /// | `DATABASE_URL`                | required                   |
    /// | `MODELS_CONFIG_PATH`          | `config/models.json`       |
    /// | `ARCHIVE_RETRY_INTERVAL_SECS` | `60`                       |
    /// | `ARCHIVE_BATCH_SIZE`          | `20`                       |
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = parse_var("PORT", 3000)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let models_config_path =
            std::env::var("MODELS_CONFIG_PATH").unwrap_or_else(|_| "config/models.json".into());

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: parse_var("SHUTDOWN_TIMEOUT_SECS", 30)?,
            database_url,
            models_config_path,
            archive_retry_interval_secs: parse_var("ARCHIVE_RETRY_INTERVAL_SECS", 60)?,
            archive_batch_size: parse_var("ARCHIVE_BATCH_SIZE", 20)?,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
