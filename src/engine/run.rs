//! Run orchestration (§9 design notes): the single entry point that
//! threads a plan through Coverage -> Materialize -> Replay -> Aggregate
//! -> manifest, as an explicit `Run` context value rather than shared
//! mutable state. One entry point dispatching on the `Strategy` enum in
//! place of separate run/runExitStack/runPolicyBacktest functions.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::aggregator::{Aggregator, CallerLeaderboard, SortField};
use crate::engine::config::EngineConfig;
use crate::engine::coverage::CoverageChecker;
use crate::engine::diagnostics::Diagnostics;
use crate::engine::errors::{BacktestError, ErrorMode};
use crate::engine::hashing::content_hash;
use crate::engine::manifest::{RunInputs, RunManifest};
use crate::engine::model::call::Call;
use crate::engine::model::candle::Interval;
use crate::engine::model::metrics_types::{PathMetrics, PolicyResult};
use crate::engine::model::run_id::RunId;
use crate::engine::planner::{Planner, PlannerInputs};
use crate::engine::policy::{Fees, Policy};
use crate::engine::replay::{ReplayEngine, Strategy};
use crate::engine::slice::SliceMaterializer;
use crate::engine::store::candle_store::CandleStore;
use crate::engine::time::UnixMs;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub calls: Vec<Call>,
    pub interval: Interval,
    pub entry_delay_ms: UnixMs,
    pub indicator_warmup_candles: u32,
    pub horizon_candles: u32,
    pub strategy: Strategy,
    pub fees: Fees,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub run_id: RunId,
    pub manifest: RunManifest,
    pub path_metrics: Vec<PathMetrics>,
    pub policy_results: Vec<PolicyResult>,
    pub leaderboard: Option<CallerLeaderboard>,
    pub diagnostics: Diagnostics,
    pub excluded_count: usize,
}

pub struct Run;

impl Run {
    /// Execute one run end to end (§4). `started_at`/`finished_at` are
    /// supplied by the caller, not read from the wall clock here, so the
    /// orchestration logic stays free of `SystemTime::now()` — the one
    /// exception is `run_id`, which the caller mints via `RunId::generate`
    /// before calling in (that is a result identifier, not simulation
    /// state, per the note in `time.rs`).
    pub async fn execute(
        config: RunConfig,
        store: &dyn CandleStore,
        run_id: RunId,
        started_at: UnixMs,
        finished_at: UnixMs,
    ) -> Result<RunOutput, BacktestError> {
        let policy_hash = policy_hash_of(&config.strategy);
        let calls_hash = content_hash(&config.calls);

        let plan = Planner::plan(&PlannerInputs {
            calls: config.calls.clone(),
            interval: config.interval,
            entry_delay_ms: config.entry_delay_ms,
            indicator_warmup_candles: config.indicator_warmup_candles,
            horizon_candles: config.horizon_candles,
        })?;

        let eligibility = CoverageChecker::check(&plan, store, config.engine.min_coverage_pct).await?;
        if !plan.per_call_window.is_empty() && eligibility.eligible_call_ids.is_empty() {
            return Err(BacktestError::Coverage(
                "no call cleared the coverage threshold".to_string(),
            ));
        }

        let slice = SliceMaterializer::materialize(&plan, &eligibility, store).await?;

        let mut eligible_windows: Vec<_> = plan
            .per_call_window
            .iter()
            .filter(|w| eligibility.eligible_call_ids.iter().any(|id| id == &w.call_id))
            .collect();
        eligible_windows.sort_by(|a, b| a.call_id.cmp(&b.call_id));

        // Replay is embarrassingly parallel across calls (§5); rayon's
        // indexed collect preserves the callId order established above, so
        // the fold below remains deterministic regardless of scheduling.
        let outcomes: Vec<_> = eligible_windows
            .par_iter()
            .map(|window| {
                let series = slice.series(&window.token.address, &window.token.chain);
                let result = match series {
                    Some(series) => ReplayEngine::run(
                        &window.call_id,
                        window,
                        &series,
                        &config.strategy,
                        config.fees,
                        config.engine.activity_move_pct,
                    ),
                    None => Err(BacktestError::DataIntegrity(format!(
                        "slice carries no row group for call {}",
                        window.call_id
                    ))),
                };
                (window.call_id.clone(), result)
            })
            .collect();

        let mut path_metrics = Vec::new();
        let mut policy_results = Vec::new();
        let mut diagnostics = Diagnostics::default();

        for (call_id, result) in outcomes {
            match result {
                Ok(outcome) => {
                    if let Some(pm) = outcome.path_metrics {
                        path_metrics.push(pm);
                    }
                    if let Some(pr) = outcome.policy_result {
                        policy_results.push(pr);
                    }
                }
                Err(e) => {
                    if config.engine.error_mode == ErrorMode::FailFast {
                        return Err(e);
                    }
                    diagnostics.record(call_id, &e);
                }
            }
        }

        let leaderboard = if matches!(config.strategy, Strategy::PathOnly) {
            None
        } else {
            Some(Aggregator::caller_leaderboard(&config.calls, &policy_results, SortField::MedianReturnBps))
        };

        let inputs = RunInputs { slice: slice.content_hash.clone(), policy: policy_hash, calls: calls_hash };
        let manifest = RunManifest::new(run_id, started_at, finished_at, inputs, config.engine.clone());

        Ok(RunOutput {
            run_id,
            manifest,
            path_metrics,
            policy_results,
            leaderboard,
            diagnostics,
            excluded_count: eligibility.excluded_count,
        })
    }
}

fn policy_hash_of(strategy: &Strategy) -> String {
    match strategy {
        Strategy::PathOnly => String::new(),
        Strategy::ExitStack(layers) => Policy::ExitStack(layers.clone()).content_hash(),
        Strategy::Policy(p) => p.content_hash(),
    }
}
