//! Core data model (§3): Call, Candle, Interval, Position, PathMetrics,
//! PolicyResult, RunId. Split one type-family per file, mirroring the
//! teacher's `events.rs` / `clock.rs` granularity.

pub mod call;
pub mod candle;
pub mod metrics_types;
pub mod position;
pub mod run_id;
