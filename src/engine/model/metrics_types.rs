//! PathMetrics and PolicyResult (§3): the two per-call outputs of a replay.
//! PathMetrics are policy-independent; PolicyResult depends on the exit
//! policy under test.

use serde::{Deserialize, Serialize};

use crate::engine::time::{UnixMs, UnixSec};

/// Policy-independent per-call path metrics (§4.I).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMetrics {
    pub call_id: String,
    /// `max(close_in_horizon) / entryPrice`. Always `>= 1.0` for any call
    /// with at least one bar at or above entry (§8 property 7).
    pub peak_multiple: f64,
    pub time_to_2x: Option<UnixSec>,
    pub time_to_3x: Option<UnixSec>,
    pub time_to_4x: Option<UnixSec>,
    /// Always `<= 0` (§8 property 7).
    pub max_drawdown_bps: f64,
    pub drawdown_to_2x_bps: Option<f64>,
    /// First bar where `|(close - entry) / entry| >= activityMovePct`,
    /// measured against entry rather than a rolling reference (see DESIGN.md).
    pub alert_to_activity_sec: Option<UnixSec>,
    pub slow_activity: bool,
}

/// Why a replay exited a call, independent of which policy kind produced
/// the action (§3, §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    TimeCap,
    TrancheTarget,
    HorizonForced,
    NoEntry,
}

/// Policy-dependent per-call result (§4.I).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub call_id: String,
    pub policy_hash: String,
    pub return_bps: f64,
    pub time_exposed_ms: UnixMs,
    pub stopped_out: bool,
    pub max_adverse_excursion_bps: f64,
    /// Realized return divided by peak-to-entry return — how much of the
    /// move the policy kept. `None` when the peak-to-entry return is zero.
    pub tail_capture_ratio: Option<f64>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
}
