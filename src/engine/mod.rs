//! Backtesting Engine
//!
//! Deterministic, causal replay engine for alert-driven crypto strategies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐      ┌──────────────┐      ┌────────────────────┐
//! │ AlertStore  │      │ CandleStore  │      │   Planner           │
//! │ (ext.)      │      │ (ext.)       │─────▶│  windows + bounds   │
//! └─────────────┘      └──────────────┘      └──────────┬──────────┘
//!                                                        ▼
//!                                             ┌─────────────────────┐
//!                                             │  CoverageChecker    │
//!                                             └──────────┬──────────┘
//!                                                        ▼
//!                                             ┌─────────────────────┐
//!                                             │ SliceMaterializer   │
//!                                             │ (content-addressed) │
//!                                             └──────────┬──────────┘
//!                                                        ▼
//! ┌─────────────┐      ┌──────────────┐      ┌─────────────────────┐
//! │ PolicyLibrary│◀────│ ReplayEngine │◀─────│ CausalAccessor      │
//! │ (Action fn)  │────▶│ (per call)   │      │ (cursor over Slice) │
//! └─────────────┘      └──────┬───────┘      └─────────────────────┘
//!                             ▼
//!                   ┌───────────────────┐
//!                   │ MetricsCollector  │
//!                   └─────────┬─────────┘
//!                             ▼
//!          ┌──────────────────┴──────────────────┐
//!          ▼                                      ▼
//! ┌─────────────────┐                   ┌────────────────────┐
//! │   Aggregator     │                  │    Optimizer        │
//! │ (caller rollups)  │                 │ (grid search)        │
//! └─────────────────┘                   └────────────────────┘
//! ```
//!
//! # Determinism Guarantees
//!
//! - Replay never reads a candle past the cursor ([`accessor::CausalAccessor`]).
//! - Percentiles and aggregations fold over a fixed `callId`/tuple-index sort
//!   order ([`metrics::percentile`], [`aggregator`]).
//! - A Slice/Policy/Calls set is identified by a SHA-256 content hash; two
//!   materializations of the same inputs are byte-identical.

pub mod accessor;
pub mod action;
pub mod aggregator;
pub mod artifact_store;
pub mod capital;
pub mod collector;
pub mod config;
pub mod coverage;
pub mod diagnostics;
pub mod errors;
pub mod hashing;
pub mod indicator;
pub mod manifest;
pub mod model;
pub mod optimizer;
pub mod planner;
pub mod policy;
pub mod replay;
pub mod run;
pub mod slice;
pub mod store;
pub mod time;

pub use accessor::CausalAccessor;
pub use action::Action;
pub use aggregator::{Aggregator, CallerLeaderboard, CallerLeaderboardRow, SortField};
pub use artifact_store::{ArtifactStore, ArtifactStoreError};
pub use capital::{AdmissionDecision, CapitalAwareConfig, CapitalPool};
pub use collector::MetricsCollector;
pub use config::{EngineConfig, StoreConfig};
pub use coverage::{CoverageChecker, CoverageReport, CoverageStatus, EligibilityReport};
pub use diagnostics::{Diagnostics, DiagnosticsRecord};
pub use errors::{BacktestError, ErrorMode, ExitCode};
pub use hashing::{content_hash, ContentHash};
pub use indicator::{rsi, sma};
pub use manifest::RunManifest;
pub use model::call::Call;
pub use model::candle::{Candle, CandleSeries, Interval};
pub use model::metrics_types::{PathMetrics, PolicyResult};
pub use model::position::Position;
pub use model::run_id::RunId;
pub use optimizer::{FeasibilityConstraints, Optimizer, OptimizerReport, ParamGrid, ScoredTuple};
pub use planner::{BacktestPlan, PlanWindow, Planner, PlannerInputs};
pub use policy::{
    exit_stack::ExitStack, fixed_tp_sl::FixedTpSl, risk_policy::RiskPolicy,
    time_cap::TimeCap, trailing_stop::TrailingStop, tranche_ladder::TrancheLadder,
    Fees, Policy, PolicyKind,
};
pub use replay::{ReplayEngine, ReplayOutcome, Strategy as RunStrategy};
pub use run::{Run, RunConfig};
pub use slice::{Slice, SliceMaterializer};
pub use store::alert_store::{AlertQuery, AlertStore, InMemoryAlertStore, SqliteAlertStore};
pub use store::candle_store::{CandleStore, InMemoryCandleStore};
