//! Replay Engine (§4.G): the deterministic, single-token event loop. One
//! `run` entry point parameterized by a `Strategy` variant, in place of a
//! family of overlapping run/runExitStack/runPathOnly functions (§9
//! redesign guidance).

use serde::{Deserialize, Serialize};

use crate::engine::accessor::CausalAccessor;
use crate::engine::action::Action;
use crate::engine::collector::MetricsCollector;
use crate::engine::errors::BacktestError;
use crate::engine::model::candle::CandleSeries;
use crate::engine::model::metrics_types::{ExitReason, PathMetrics, PolicyResult};
use crate::engine::model::position::Position;
use crate::engine::planner::PlanWindow;
use crate::engine::policy::{BarContext, Fees, Policy};

/// Which computation the Replay Engine performs for a call. `ExitStack`
/// and `Policy` are both just `Policy` values at the dispatch layer —
/// this enum exists so path-only, single-policy, and stacked-policy runs
/// are constructors on one type rather than three separate functions (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Strategy {
    PathOnly,
    ExitStack(Vec<Policy>),
    Policy(Policy),
}

impl Strategy {
    fn as_policy(&self) -> Option<Policy> {
        match self {
            Strategy::PathOnly => None,
            Strategy::ExitStack(layers) => Some(Policy::ExitStack(layers.clone())),
            Strategy::Policy(p) => Some(p.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub call_id: String,
    pub path_metrics: Option<PathMetrics>,
    pub policy_result: Option<PolicyResult>,
    pub malformed_bars_skipped: u32,
}

pub struct ReplayEngine;

impl ReplayEngine {
    /// Run one call's replay to completion (§4.G). `series` must already
    /// be normalized (strictly increasing) — the Materializer guarantees
    /// this; a non-monotonic series here is a `DataIntegrityError`.
    pub fn run(
        call_id: &str,
        window: &PlanWindow,
        series: &CandleSeries,
        strategy: &Strategy,
        fees: Fees,
        activity_move_pct: f64,
    ) -> Result<ReplayOutcome, BacktestError> {
        if !series.is_strictly_monotonic() {
            return Err(BacktestError::DataIntegrity(format!(
                "candle series for call {call_id} is not strictly monotonic after coalesce"
            )));
        }

        let entry_sec = window.entry_ts / 1000;
        let entry_idx = match series.first_index_at_or_after(entry_sec) {
            Some(idx) => idx,
            None => {
                return Ok(ReplayOutcome {
                    call_id: call_id.to_string(),
                    path_metrics: None,
                    policy_result: None,
                    malformed_bars_skipped: 0,
                })
            }
        };

        let mut malformed_bars_skipped = 0u32;
        let entry_bar = &series.bars[entry_idx];
        if entry_bar.is_malformed() {
            malformed_bars_skipped += 1;
        }

        let raw_entry_price = entry_bar.open;
        let effective_entry = apply_entry_costs(raw_entry_price, fees);

        let mut position = Position::open(effective_entry, entry_bar.timestamp);
        let mut accessor = CausalAccessor::new(series, entry_idx);
        let policy = strategy.as_policy();

        let mut exit_price = effective_entry;
        let mut exit_reason = ExitReason::HorizonForced;
        let mut any_exit_recorded = false;
        let horizon_ms = window.to;

        loop {
            if !accessor.advance() {
                // series exhausted before horizon or exit: force a close
                if !position.is_closed() {
                    let close_price = apply_exit_costs(accessor.current().close, fees);
                    settle_full_exit(&mut position, close_price, effective_entry, &mut exit_price, &mut exit_reason, ExitReason::HorizonForced);
                    any_exit_recorded = true;
                }
                break;
            }

            let bar = *accessor.current();
            if bar.is_malformed() {
                malformed_bars_skipped += 1;
                continue;
            }
            position.observe_bar(bar.high, bar.low);

            let elapsed_ms = bar.timestamp * 1000 - window.entry_ts;
            if bar.timestamp * 1000 >= horizon_ms {
                let close_price = apply_exit_costs(bar.close, fees);
                settle_full_exit(&mut position, close_price, effective_entry, &mut exit_price, &mut exit_reason, ExitReason::HorizonForced);
                any_exit_recorded = true;
                break;
            }

            if let Some(policy) = &policy {
                let ctx = BarContext { bar, entry_price: effective_entry, elapsed_ms, bar_index: accessor.cursor() };
                let actions = policy.on_bar(&ctx, &mut position);
                for action in actions {
                    match action {
                        Action::ExitFull(price_ref, reason) => {
                            let fill = apply_exit_costs(price_ref, fees);
                            settle_full_exit(&mut position, fill, effective_entry, &mut exit_price, &mut exit_reason, reason);
                            any_exit_recorded = true;
                        }
                        Action::ExitTranche(id, frac, price_ref, reason) => {
                            let fill = apply_exit_costs(price_ref, fees);
                            let applied = position.reduce(frac);
                            position.realized_pnl_bps += applied * (fill / effective_entry - 1.0) * 10_000.0;
                            position.exited_tranches.insert(id);
                            exit_price = fill;
                            exit_reason = reason;
                            any_exit_recorded = true;
                        }
                        Action::AdjustStop(_) | Action::HoldOn => {}
                    }
                }
            }

            if position.is_closed() {
                break;
            }
        }

        // Fold the full entry-to-horizon window, not just the bars the
        // replay loop walked before its policy exited — PathMetrics must
        // be identical across policies run over the same call.
        let path_metrics = Some(MetricsCollector::path_metrics(call_id, effective_entry, series, entry_idx, activity_move_pct));

        let policy_result = if policy.is_some() {
            let time_exposed_ms = accessor.current().timestamp * 1000 - window.entry_ts;
            let max_adverse_excursion_bps = position.drawdown_bps();
            let peak_to_entry_bps = path_metrics.as_ref().map(|pm| (pm.peak_multiple - 1.0) * 10_000.0).unwrap_or(0.0);
            let tail_capture_ratio = if peak_to_entry_bps.abs() > 1e-9 {
                Some(position.realized_pnl_bps / peak_to_entry_bps)
            } else {
                None
            };
            let stopped_out = matches!(exit_reason, ExitReason::StopLoss | ExitReason::TrailingStop);

            Some(PolicyResult {
                call_id: call_id.to_string(),
                policy_hash: policy.as_ref().map(|p| p.content_hash()).unwrap_or_default(),
                return_bps: position.realized_pnl_bps,
                time_exposed_ms,
                stopped_out,
                max_adverse_excursion_bps,
                tail_capture_ratio,
                entry_price: effective_entry,
                exit_price: if any_exit_recorded { exit_price } else { effective_entry },
                exit_reason,
            })
        } else {
            None
        };

        Ok(ReplayOutcome { call_id: call_id.to_string(), path_metrics, policy_result, malformed_bars_skipped })
    }
}

fn settle_full_exit(
    position: &mut Position,
    fill_price: f64,
    entry_price: f64,
    exit_price: &mut f64,
    exit_reason: &mut ExitReason,
    reason: ExitReason,
) {
    let remaining = position.size_remaining;
    position.realized_pnl_bps += remaining * (fill_price / entry_price - 1.0) * 10_000.0;
    position.reduce(remaining);
    *exit_price = fill_price;
    *exit_reason = reason;
}

fn apply_entry_costs(raw_price: f64, fees: Fees) -> f64 {
    raw_price * (1.0 + fees.slippage_bps / 1e4) * (1.0 + fees.taker_bps / 1e4)
}

fn apply_exit_costs(raw_price: f64, fees: Fees) -> f64 {
    raw_price * (1.0 - fees.slippage_bps / 1e4) * (1.0 - fees.taker_bps / 1e4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::candle::{Candle, Interval};
    use crate::engine::model::call::TokenRef;
    use crate::engine::policy::fixed_tp_sl::FixedTpSl;
    use crate::engine::policy::trailing_stop::TrailingStop;

    fn bar(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle { timestamp: ts, open: o, high: h, low: l, close: c, volume: 1.0 }
    }

    fn window(entry_ts: i64, to: i64) -> PlanWindow {
        PlanWindow {
            call_id: "c1".to_string(),
            token: TokenRef::new("0xabc", "solana"),
            from: 0,
            to,
            entry_ts,
            entry_delay_candles: 0,
            interval_seconds: 1,
        }
    }

    fn zero_fees() -> Fees {
        Fees { taker_bps: 0.0, slippage_bps: 0.0 }
    }

    #[test]
    fn test_s1_fixed_tp_sl_tp_first() {
        let mut series = CandleSeries::new("0xabc", "solana", Interval::Sec15);
        series.bars = vec![
            bar(0, 1.00, 1.00, 1.00, 1.00),
            bar(1, 1.05, 2.10, 0.95, 1.10),
            bar(2, 1.10, 1.15, 1.00, 1.02),
        ];
        let w = window(0, 3000);
        let strategy = Strategy::Policy(Policy::FixedTpSl(FixedTpSl::new(2.0, 0.5)));
        let outcome = ReplayEngine::run("c1", &w, &series, &strategy, zero_fees(), 0.10).unwrap();
        let pr = outcome.policy_result.unwrap();
        assert_eq!(pr.return_bps, 10_000.0);
        assert_eq!(pr.exit_reason, ExitReason::TakeProfit);
        assert!(pr.max_adverse_excursion_bps <= 0.0);
        let pm = outcome.path_metrics.unwrap();
        // peak_multiple is close-based (§4.I, glossary) while time_to_2x is
        // high-based, so a bar that only *touches* 2x without closing there
        // raises time_to_2x without raising peak_multiple to 2.0.
        assert!(pm.peak_multiple >= 1.0);
        assert_eq!(pm.time_to_2x, Some(1));
    }

    #[test]
    fn test_path_metrics_cover_full_horizon_past_an_early_policy_exit() {
        // TP fires at bar 1 and the replay loop stops there, but bar 4
        // later touches 3x within the same horizon. PathMetrics must see
        // it: it is policy-independent, not truncated at the exit cursor.
        let mut series = CandleSeries::new("0xabc", "solana", Interval::Sec15);
        series.bars = vec![
            bar(0, 1.00, 1.00, 1.00, 1.00),
            bar(1, 1.05, 2.10, 0.95, 1.10),
            bar(2, 1.10, 1.15, 1.00, 1.02),
            bar(3, 1.05, 1.10, 1.00, 1.05),
            bar(4, 1.10, 3.50, 1.00, 1.20),
        ];
        let w = window(0, 5000);
        let strategy = Strategy::Policy(Policy::FixedTpSl(FixedTpSl::new(2.0, 0.5)));
        let outcome = ReplayEngine::run("c1", &w, &series, &strategy, zero_fees(), 0.10).unwrap();
        let pr = outcome.policy_result.unwrap();
        assert_eq!(pr.exit_reason, ExitReason::TakeProfit, "policy still exits at bar 1");
        let pm = outcome.path_metrics.unwrap();
        assert_eq!(pm.time_to_3x, Some(4), "path metrics must see the bar-4 touch even though the policy exited at bar 1");
    }

    #[test]
    fn test_s2_stop_first_tie_break() {
        let mut series = CandleSeries::new("0xabc", "solana", Interval::Sec15);
        series.bars = vec![bar(0, 1.00, 1.00, 1.00, 1.00), bar(1, 0.95, 2.00, 0.40, 1.00)];
        let w = window(0, 3000);
        let strategy = Strategy::Policy(Policy::FixedTpSl(FixedTpSl::new(2.0, 0.5)));
        let outcome = ReplayEngine::run("c1", &w, &series, &strategy, zero_fees(), 0.10).unwrap();
        let pr = outcome.policy_result.unwrap();
        assert_eq!(pr.return_bps, -5_000.0);
        assert_eq!(pr.exit_reason, ExitReason::StopLoss);
        assert!(pr.stopped_out);
    }

    #[test]
    fn test_s3_trailing_stop() {
        let mut series = CandleSeries::new("0xabc", "solana", Interval::Sec15);
        series.bars = vec![
            bar(0, 1.00, 1.00, 1.00, 1.00),
            bar(1, 1.40, 1.60, 1.30, 1.55),
            bar(2, 2.00, 2.00, 1.90, 2.00),
            bar(3, 1.90, 1.95, 1.40, 1.50),
        ];
        let w = window(0, 4000);
        let strategy = Strategy::Policy(Policy::TrailingStop(TrailingStop::new(1.5, 0.2)));
        let outcome = ReplayEngine::run("c1", &w, &series, &strategy, zero_fees(), 0.10).unwrap();
        let pr = outcome.policy_result.unwrap();
        assert_eq!(pr.exit_reason, ExitReason::TrailingStop);
        assert!(pr.stopped_out);
    }

    #[test]
    fn test_s4_no_entry() {
        let mut series = CandleSeries::new("0xabc", "solana", Interval::Sec15);
        series.bars = vec![bar(0, 1.0, 1.0, 1.0, 1.0)];
        let w = window(100_000, 200_000); // entry far beyond the only bar
        let strategy = Strategy::Policy(Policy::FixedTpSl(FixedTpSl::new(2.0, 0.5)));
        let outcome = ReplayEngine::run("c1", &w, &series, &strategy, zero_fees(), 0.10).unwrap();
        assert!(outcome.path_metrics.is_none());
        assert!(outcome.policy_result.is_none());
    }

    #[test]
    fn test_path_only_strategy_emits_no_policy_result() {
        let mut series = CandleSeries::new("0xabc", "solana", Interval::Sec15);
        series.bars = vec![bar(0, 1.0, 1.0, 1.0, 1.0), bar(1, 1.1, 1.2, 1.0, 1.1)];
        let w = window(0, 2000);
        let outcome = ReplayEngine::run("c1", &w, &series, &Strategy::PathOnly, zero_fees(), 0.10).unwrap();
        assert!(outcome.path_metrics.is_some());
        assert!(outcome.policy_result.is_none());
    }

    #[test]
    fn test_non_monotonic_series_is_data_integrity_error() {
        let mut series = CandleSeries::new("0xabc", "solana", Interval::Sec15);
        series.bars = vec![bar(1, 1.0, 1.0, 1.0, 1.0), bar(0, 1.0, 1.0, 1.0, 1.0)];
        let w = window(0, 2000);
        let result = ReplayEngine::run("c1", &w, &series, &Strategy::PathOnly, zero_fees(), 0.10);
        assert!(matches!(result, Err(BacktestError::DataIntegrity(_))));
    }
}
