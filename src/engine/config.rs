//! Engine configuration (§6 environment variables). Kept explicit and
//! flat, read once at process start and threaded through as a `Run`
//! context value rather than read ad hoc from `env::var` at call sites
//! (§9: no shared singletons).

use std::env;

use serde::{Deserialize, Serialize};

use crate::engine::errors::BacktestError;

/// Connection settings for the Candle Store (§6).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub candle_host: String,
    pub candle_port: u16,
    pub candle_db: String,
    pub candle_user: String,
    pub candle_pass: String,
    pub connect_timeout_sec: u64,
    pub query_timeout_sec: u64,
    pub alert_db_path: String,
    pub slice_base_path: String,
    pub parquet_base_path: Option<String>,
}

impl StoreConfig {
    /// Build from the environment variables named in §6. Missing optional
    /// values fall back to sane defaults; a missing `DUCKDB_PATH` is a
    /// configuration error since the Alert Store cannot be opened without
    /// it.
    pub fn from_env() -> Result<Self, BacktestError> {
        Ok(Self {
            candle_host: env::var("CANDLE_STORE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            candle_port: env::var("CANDLE_STORE_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5432),
            candle_db: env::var("CANDLE_STORE_DB").unwrap_or_else(|_| "candles".to_string()),
            candle_user: env::var("CANDLE_STORE_USER").unwrap_or_else(|_| "backtest".to_string()),
            candle_pass: env::var("CANDLE_STORE_PASS").unwrap_or_default(),
            connect_timeout_sec: env::var("CANDLE_STORE_CONNECT_TIMEOUT_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            query_timeout_sec: env::var("CANDLE_STORE_QUERY_TIMEOUT_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            alert_db_path: env::var("DUCKDB_PATH")
                .map_err(|_| BacktestError::Configuration("DUCKDB_PATH is not set".to_string()))?,
            slice_base_path: env::var("SLICE_BASE_PATH").unwrap_or_else(|_| "./slices".to_string()),
            parquet_base_path: env::var("PARQUET_BASE_PATH").ok(),
        })
    }
}

/// Run-wide knobs that are not store connections: coverage threshold,
/// retry policy, error handling mode (§5, §7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub min_coverage_pct: f64,
    pub max_retries: u32,
    pub error_mode: crate::engine::errors::ErrorMode,
    pub activity_move_pct: f64,
    pub threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_coverage_pct: 0.80,
            max_retries: 3,
            error_mode: crate::engine::errors::ErrorMode::Collect,
            activity_move_pct: 0.10,
            threads: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("MIN_COVERAGE_PCT") {
            if let Ok(parsed) = v.parse() {
                cfg.min_coverage_pct = parsed;
            }
        }
        if let Ok(v) = env::var("MAX_RETRIES") {
            if let Ok(parsed) = v.parse() {
                cfg.max_retries = parsed;
            }
        }
        if env::var("RUN_DB_STRESS").is_ok() {
            tracing::info!("RUN_DB_STRESS set: integration tests will exercise real stores");
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.min_coverage_pct, 0.80);
        assert_eq!(cfg.max_retries, 3);
    }
}
