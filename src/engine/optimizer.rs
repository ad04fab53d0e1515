//! Grid-Search Policy Optimizer (§4.J): enumerates a parameter grid,
//! replays every call under every tuple, filters by feasibility, and
//! scores the survivors. Embarrassingly parallel across tuples and
//! across calls within a tuple (§5) via `rayon`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::collector::percentile;
use crate::engine::errors::BacktestError;
use crate::engine::planner::PlanWindow;
use crate::engine::policy::{fixed_tp_sl::FixedTpSl, time_cap::TimeCap, Fees, Policy};
use crate::engine::replay::{ReplayEngine, Strategy};
use crate::engine::slice::Slice;

pub const DEFAULT_LAMBDA_DRAWDOWN: f64 = 0.5;
pub const DEFAULT_LAMBDA_TIME: f64 = 0.1;

/// Cartesian product axes. `max_hold_hours`, when non-empty, wraps each
/// `fixed_tp_sl` candidate in an `exit_stack` with a `time_cap` layer so
/// the wall-clock cap acts as a backstop rather than a competing exit
/// (§4.H `exit_stack` semantics: first acting layer wins).
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub tp_mults: Vec<f64>,
    pub sl_mults: Vec<f64>,
    pub max_hold_hours: Vec<f64>,
}

impl ParamGrid {
    /// All candidate policies in the cartesian product, in a fixed,
    /// reproducible enumeration order (§5).
    pub fn candidates(&self) -> Vec<Policy> {
        let mut out = Vec::new();
        for &tp in &self.tp_mults {
            for &sl in &self.sl_mults {
                let base = Policy::FixedTpSl(FixedTpSl::new(tp, sl));
                if self.max_hold_hours.is_empty() {
                    out.push(base);
                } else {
                    for &hours in &self.max_hold_hours {
                        let cap = Policy::TimeCap(TimeCap::new((hours * 3_600_000.0) as i64));
                        out.push(Policy::ExitStack(vec![base.clone(), cap]));
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityConstraints {
    pub max_stop_out_rate: f64,
    /// More negative is worse; a tuple is feasible only if its observed
    /// p95 drawdown is *no worse than* this floor (§4.H).
    pub max_p95_drawdown_bps: f64,
    pub max_time_exposed_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTuple {
    pub policy_hash: String,
    pub median_return_bps: f64,
    pub p95_drawdown_bps: f64,
    pub avg_time_exposed_hours: f64,
    pub stop_out_rate: f64,
    pub score: f64,
    pub feasible: bool,
    pub calls_evaluated: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizerReport {
    pub policies_evaluated: usize,
    pub feasible: usize,
    pub best: Option<ScoredTuple>,
    pub evaluated: Vec<ScoredTuple>,
}

pub struct Optimizer;

impl Optimizer {
    pub fn run(
        windows: &[PlanWindow],
        slice: &Slice,
        grid: &ParamGrid,
        constraints: &FeasibilityConstraints,
        fees: Fees,
        activity_move_pct: f64,
    ) -> Result<OptimizerReport, BacktestError> {
        let candidates = grid.candidates();

        // Sort windows once by callId so every tuple's evaluation folds
        // in the same deterministic order (§5).
        let mut sorted_windows: Vec<&PlanWindow> = windows.iter().collect();
        sorted_windows.sort_by(|a, b| a.call_id.cmp(&b.call_id));

        let scored: Vec<ScoredTuple> = candidates
            .par_iter()
            .map(|policy| evaluate_tuple(policy, &sorted_windows, slice, fees, activity_move_pct, constraints))
            .collect::<Result<Vec<_>, BacktestError>>()?;

        let feasible_count = scored.iter().filter(|s| s.feasible).count();
        let best = scored
            .iter()
            .filter(|s| s.feasible)
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .cloned();

        Ok(OptimizerReport { policies_evaluated: scored.len(), feasible: feasible_count, best, evaluated: scored })
    }
}

fn evaluate_tuple(
    policy: &Policy,
    windows: &[&PlanWindow],
    slice: &Slice,
    fees: Fees,
    activity_move_pct: f64,
    constraints: &FeasibilityConstraints,
) -> Result<ScoredTuple, BacktestError> {
    let strategy = Strategy::Policy(policy.clone());

    let results: Vec<_> = windows
        .par_iter()
        .filter_map(|window| {
            let series = slice.series(&window.token.address, &window.token.chain)?;
            ReplayEngine::run(&window.call_id, window, &series, &strategy, fees, activity_move_pct).ok()
        })
        .filter_map(|outcome| outcome.policy_result)
        .collect();

    let calls_evaluated = results.len();

    let mut returns: Vec<f64> = results.iter().map(|r| r.return_bps).collect();
    returns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut drawdowns: Vec<f64> = results.iter().map(|r| r.max_adverse_excursion_bps).collect();
    drawdowns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let median_return_bps = percentile(&returns, 0.5).unwrap_or(0.0);
    // p95 of the *magnitude* of adverse excursion: sort ascending (most
    // negative first) and take the 95th percentile from the worst side.
    let p95_drawdown_bps = percentile(&drawdowns, 0.05).unwrap_or(0.0);

    let stop_out_rate = if calls_evaluated == 0 {
        0.0
    } else {
        results.iter().filter(|r| r.stopped_out).count() as f64 / calls_evaluated as f64
    };
    let avg_time_exposed_hours = if calls_evaluated == 0 {
        0.0
    } else {
        results.iter().map(|r| r.time_exposed_ms as f64).sum::<f64>() / calls_evaluated as f64 / 3_600_000.0
    };

    let feasible = stop_out_rate <= constraints.max_stop_out_rate
        && p95_drawdown_bps >= constraints.max_p95_drawdown_bps
        && (avg_time_exposed_hours * 3_600_000.0) <= constraints.max_time_exposed_ms as f64;

    let score = median_return_bps
        - DEFAULT_LAMBDA_DRAWDOWN * p95_drawdown_bps.abs()
        - DEFAULT_LAMBDA_TIME * avg_time_exposed_hours;

    Ok(ScoredTuple {
        policy_hash: policy.content_hash(),
        median_return_bps,
        p95_drawdown_bps,
        avg_time_exposed_hours,
        stop_out_rate,
        score,
        feasible,
        calls_evaluated,
    })
}
