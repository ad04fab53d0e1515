//! Error taxonomy (§7).
//!
//! The engine never depends on `thiserror`; error enums get a hand-rolled
//! `Display` + `std::error::Error` impl and `From` conversions at the few
//! places an external crate's error crosses the boundary (`rusqlite::Error`,
//! `serde_json::Error`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a run treats a per-call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorMode {
    /// Record the failure in diagnostics, exclude the call, keep going.
    #[default]
    Collect,
    /// Abort the whole run on the first per-call failure.
    FailFast,
}

/// The engine's error taxonomy (§7). `ConfigurationError` and
/// `CoverageError` are always fatal to the run; the rest are per-call unless
/// `ErrorMode::FailFast` is in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BacktestError {
    /// Missing canonical view, bad interval, malformed policy JSON,
    /// unrecognized strategy mode. Never retried.
    Configuration(String),
    /// No eligible calls after coverage. Fatal to the run.
    Coverage(String),
    /// Store disconnect, timeout, 5xx. Retried with backoff before this is
    /// raised; once raised it is fatal per-call (collect mode) or per-run
    /// (fail-fast mode).
    TransientStore(String),
    /// Non-monotonic timestamps after coalesce, negative prices, `high <
    /// low`. The offending call is marked failed; never retried.
    DataIntegrity(String),
    /// A policy's `onBar` hit an unexpected condition. Carries the policy
    /// hash and bar index so the failure is reproducible from diagnostics.
    Policy {
        policy_hash: String,
        bar_index: usize,
        message: String,
    },
}

impl BacktestError {
    /// Short tag used in diagnostics records and manifest error summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            BacktestError::Configuration(_) => "ConfigurationError",
            BacktestError::Coverage(_) => "CoverageError",
            BacktestError::TransientStore(_) => "TransientStoreError",
            BacktestError::DataIntegrity(_) => "DataIntegrityError",
            BacktestError::Policy { .. } => "PolicyError",
        }
    }

    /// Deterministic errors are never retried (§7 propagation policy).
    pub fn is_retryable(&self) -> bool {
        matches!(self, BacktestError::TransientStore(_))
    }

    /// Planner and Materializer errors are always fatal to the run,
    /// regardless of `ErrorMode`.
    pub fn always_fatal(&self) -> bool {
        matches!(
            self,
            BacktestError::Configuration(_) | BacktestError::Coverage(_)
        )
    }
}

impl fmt::Display for BacktestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            BacktestError::Coverage(msg) => write!(f, "coverage error: {msg}"),
            BacktestError::TransientStore(msg) => write!(f, "transient store error: {msg}"),
            BacktestError::DataIntegrity(msg) => write!(f, "data integrity error: {msg}"),
            BacktestError::Policy {
                policy_hash,
                bar_index,
                message,
            } => write!(
                f,
                "policy error (policy={policy_hash}, bar={bar_index}): {message}"
            ),
        }
    }
}

impl std::error::Error for BacktestError {}

impl From<rusqlite::Error> for BacktestError {
    fn from(e: rusqlite::Error) -> Self {
        BacktestError::TransientStore(e.to_string())
    }
}

impl From<serde_json::Error> for BacktestError {
    fn from(e: serde_json::Error) -> Self {
        BacktestError::Configuration(e.to_string())
    }
}

/// CLI-facing exit codes (§6). Only meaningful at the binary boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Configuration = 2,
    Operational = 3,
    NoEligibleCalls = 4,
}

impl BacktestError {
    /// Map onto the CLI exit codes documented in §6.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            BacktestError::Configuration(_) => ExitCode::Configuration,
            BacktestError::Coverage(_) => ExitCode::NoEligibleCalls,
            BacktestError::TransientStore(_) => ExitCode::Operational,
            BacktestError::DataIntegrity(_) | BacktestError::Policy { .. } => {
                ExitCode::Operational
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy() {
        assert!(BacktestError::TransientStore("x".into()).is_retryable());
        assert!(!BacktestError::DataIntegrity("x".into()).is_retryable());
    }

    #[test]
    fn test_always_fatal() {
        assert!(BacktestError::Configuration("x".into()).always_fatal());
        assert!(BacktestError::Coverage("x".into()).always_fatal());
        assert!(!BacktestError::TransientStore("x".into()).always_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            BacktestError::Coverage("x".into()).exit_code(),
            ExitCode::NoEligibleCalls
        );
    }
}
