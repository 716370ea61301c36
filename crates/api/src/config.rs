//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DEFAULT_TIMEOUT_MS` — LRA time limit when the client gives none (default: `30000`)
/// - `CALLBACK_TIMEOUT_MS` — bound on a single participant callback (default: `10000`)
/// - `RECOVERY_INTERVAL_MS` — period of the background recovery scan (default: `2000`)
/// - `EVICTION_RETENTION_MS` — how long finished LRAs stay queryable (default: `120000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub default_timeout: Duration,
    pub callback_timeout: Duration,
    pub recovery_interval: Duration,
    pub eviction_retention: Duration,
}

fn duration_var(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_ms),
    )
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            default_timeout: duration_var("DEFAULT_TIMEOUT_MS", 30_000),
            callback_timeout: duration_var("CALLBACK_TIMEOUT_MS", 10_000),
            recovery_interval: duration_var("RECOVERY_INTERVAL_MS", 2_000),
            eviction_retention: duration_var("EVICTION_RETENTION_MS", 120_000),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            default_timeout: Duration::from_secs(30),
            callback_timeout: Duration::from_secs(10),
            recovery_interval: Duration::from_secs(2),
            eviction_retention: Duration::from_secs(120),
        }
    }
}
