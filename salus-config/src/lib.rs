use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use anyhow::{Context, Result};

/// Runtime configuration for the salus state service.
///
/// Loaded from a JSON file when one exists, otherwise defaulted; individual
/// fields can then be overridden from the environment (`SALUS_*`) or from
/// CLI flags by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Port the HTTP API listens on
    pub api_port: u16,
    /// Path of the embedded database file
    pub db_path: PathBuf,
    /// Daily token budget per user
    pub daily_token_limit: u64,
    /// How many days beyond today ledger rows are retained
    pub retention_days: u32,
    /// Maximum stored length of a question preview, in characters
    pub preview_max_chars: usize,
    /// Seconds between periodic retention sweeps
    pub sweep_interval_secs: u64,
    /// Maximum concurrent exclusivity claims per professional
    pub max_exclusive_claims: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_port: 3004,
            db_path: PathBuf::from("/var/lib/salus/state.redb"),
            daily_token_limit: 1000,
            retention_days: 1,
            preview_max_chars: 100,
            sweep_interval_secs: 3600,
            max_exclusive_claims: 3,
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path.as_ref())
            .with_context(|| format!("Unable to read config from {}", path.as_ref().display()))?;
        let config: ServiceConfig = serde_json::from_slice(&raw)
            .with_context(|| format!("Invalid config file at {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Applies `SALUS_*` environment variable overrides in place.
    /// Unparseable values are ignored in favor of the current setting.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("SALUS_API_PORT") {
            if let Ok(port) = port.parse() {
                self.api_port = port;
            }
        }
        if let Ok(path) = std::env::var("SALUS_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Ok(limit) = std::env::var("SALUS_DAILY_TOKEN_LIMIT") {
            if let Ok(limit) = limit.parse() {
                self.daily_token_limit = limit;
            }
        }
        if let Ok(days) = std::env::var("SALUS_RETENTION_DAYS") {
            if let Ok(days) = days.parse() {
                self.retention_days = days;
            }
        }
        if let Ok(secs) = std::env::var("SALUS_SWEEP_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                self.sweep_interval_secs = secs;
            }
        }
    }
}
