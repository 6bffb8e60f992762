//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// Runtime configuration for berth-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// SQLite (or other) database URL (default: `"sqlite://berth.db"`).
    /// Any sqlx-compatible connection string works.
    pub database_url: String,

    /// Directory holding local working copies of synced repositories.
    pub repo_dir: PathBuf,

    /// Seconds between health-monitor ticks; values below 30 are raised
    /// to 30.
    pub health_interval_secs: u64,

    /// Per-probe HTTP timeout in seconds (minimum 1).
    pub health_timeout_secs: u64,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated CORS origin allow-list; `None` means wildcard.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui` (disable in production).
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("BERTH_BIND", "0.0.0.0:3000"),
            database_url: env_or("BERTH_DATABASE_URL", "sqlite://berth.db"),
            repo_dir: PathBuf::from(env_or("BERTH_REPO_DIR", "data/repos")),
            health_interval_secs: parse_env("BERTH_HEALTH_INTERVAL_SECS", 120u64).max(30),
            health_timeout_secs: parse_env("BERTH_HEALTH_TIMEOUT_SECS", 10u64).max(1),
            log_level: env_or("BERTH_LOG", "info"),
            log_json: std::env::var("BERTH_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_allowed_origins: std::env::var("BERTH_CORS_ORIGINS").ok(),
            enable_swagger: std::env::var("BERTH_ENABLE_SWAGGER")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
