//! Backtest Planner (§4.C): turns a set of calls plus a horizon shape into
//! the exact per-call windows the rest of the pipeline needs.

use serde::{Deserialize, Serialize};

use crate::engine::errors::BacktestError;
use crate::engine::model::call::{Call, TokenRef};
use crate::engine::model::candle::Interval;
use crate::engine::time::UnixMs;

#[derive(Debug, Clone)]
pub struct PlannerInputs {
    pub calls: Vec<Call>,
    pub interval: Interval,
    pub entry_delay_ms: UnixMs,
    pub indicator_warmup_candles: u32,
    pub horizon_candles: u32,
}

/// The exact time window one call needs fetched, plus the derived entry
/// timestamp the Replay Engine will search for its entry bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanWindow {
    pub call_id: String,
    pub token: TokenRef,
    pub from: UnixMs,
    pub to: UnixMs,
    pub entry_ts: UnixMs,
    pub entry_delay_candles: u32,
    pub interval_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestPlan {
    pub per_call_window: Vec<PlanWindow>,
    pub global_from: UnixMs,
    pub global_to: UnixMs,
    pub interval_seconds: u32,
}

pub struct Planner;

impl Planner {
    /// Empty `calls` yields an empty, successful plan (§4.C failure
    /// modes) — an empty alert set is not a configuration error, it is
    /// simply nothing to backtest.
    pub fn plan(inputs: &PlannerInputs) -> Result<BacktestPlan, BacktestError> {
        let interval_seconds = inputs.interval.seconds_per_bar() as u32;

        if inputs.calls.is_empty() {
            return Ok(BacktestPlan {
                per_call_window: Vec::new(),
                global_from: 0,
                global_to: 0,
                interval_seconds,
            });
        }

        let mut windows = Vec::with_capacity(inputs.calls.len());
        let mut global_from = i64::MAX;
        let mut global_to = i64::MIN;

        for call in &inputs.calls {
            let entry_ts = call.call_timestamp + inputs.entry_delay_ms;
            let from = entry_ts - inputs.indicator_warmup_candles as i64 * interval_seconds as i64 * 1000;
            let to = entry_ts + inputs.horizon_candles as i64 * interval_seconds as i64 * 1000;

            global_from = global_from.min(from);
            global_to = global_to.max(to);

            windows.push(PlanWindow {
                call_id: call.call_id.clone(),
                token: call.token.clone(),
                from,
                to,
                entry_ts,
                entry_delay_candles: (inputs.entry_delay_ms / (interval_seconds as i64 * 1000).max(1)) as u32,
                interval_seconds,
            });
        }

        Ok(BacktestPlan { per_call_window: windows, global_from, global_to, interval_seconds })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, ts: UnixMs) -> Call {
        Call::new(id, "alice", TokenRef::new("0xabc", "solana"), ts)
    }

    #[test]
    fn test_empty_calls_yields_empty_plan() {
        let inputs = PlannerInputs {
            calls: vec![],
            interval: Interval::OneMinute,
            entry_delay_ms: 0,
            indicator_warmup_candles: 14,
            horizon_candles: 60,
        };
        let plan = Planner::plan(&inputs).unwrap();
        assert!(plan.per_call_window.is_empty());
    }

    #[test]
    fn test_window_bounds_from_entry_delay_and_horizon() {
        let inputs = PlannerInputs {
            calls: vec![call("c1", 1_000_000)],
            interval: Interval::OneMinute,
            entry_delay_ms: 5_000,
            indicator_warmup_candles: 2,
            horizon_candles: 10,
        };
        let plan = Planner::plan(&inputs).unwrap();
        let w = &plan.per_call_window[0];
        assert_eq!(w.entry_ts, 1_005_000);
        assert_eq!(w.from, 1_005_000 - 2 * 60 * 1000);
        assert_eq!(w.to, 1_005_000 + 10 * 60 * 1000);
        assert!(w.from <= w.to);
    }

    #[test]
    fn test_global_bounds_are_union() {
        let inputs = PlannerInputs {
            calls: vec![call("c1", 0), call("c2", 1_000_000)],
            interval: Interval::OneMinute,
            entry_delay_ms: 0,
            indicator_warmup_candles: 0,
            horizon_candles: 1,
        };
        let plan = Planner::plan(&inputs).unwrap();
        assert_eq!(plan.global_from, 0);
        assert_eq!(plan.global_to, 1_000_000 + 60_000);
    }
}
