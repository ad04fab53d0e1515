//! Aggregator (§4.I/§4.K): rolls per-call `PolicyResult`s up into
//! per-caller leaderboard rows. Every fold walks results in `callId` order
//! so two runs over the same inputs produce byte-identical output (§5,
//! §8 property 1).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::collector::percentile;
use crate::engine::model::call::Call;
use crate::engine::model::metrics_types::PolicyResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    MedianReturnBps,
    HitRate,
    CallCount,
    P95DrawdownBps,
    P95ReturnBps,
    StopOutRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerLeaderboardRow {
    pub caller: String,
    /// Every call attributed to this caller, eligible or not.
    pub call_count: usize,
    /// Calls that cleared coverage and produced a policy result.
    pub eligible_count: usize,
    pub median_return_bps: f64,
    pub p95_return_bps: f64,
    /// Non-stopped-out fraction of eligible calls.
    pub hit_rate: f64,
    pub p95_drawdown_bps: f64,
    pub avg_time_exposed_hours: f64,
    pub stop_out_rate: f64,
    pub avg_tail_capture_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerLeaderboard {
    pub rows: Vec<CallerLeaderboardRow>,
}

pub struct Aggregator;

impl Aggregator {
    /// Build a per-caller rollup. `results` need not be pre-sorted; this
    /// sorts by `callId` before folding so the fold order is independent
    /// of the order replay happened to finish in (replay runs in
    /// parallel, §5).
    pub fn caller_leaderboard(calls: &[Call], results: &[PolicyResult], sort_by: SortField) -> CallerLeaderboard {
        let caller_of: BTreeMap<&str, &str> =
            calls.iter().map(|c| (c.call_id.as_str(), c.caller.as_str())).collect();

        let mut call_count_by_caller: BTreeMap<&str, usize> = BTreeMap::new();
        for call in calls {
            *call_count_by_caller.entry(call.caller.as_str()).or_insert(0) += 1;
        }

        let mut by_caller: BTreeMap<&str, Vec<&PolicyResult>> = BTreeMap::new();
        for result in results {
            if let Some(&caller) = caller_of.get(result.call_id.as_str()) {
                by_caller.entry(caller).or_default().push(result);
            }
        }

        let mut rows: Vec<CallerLeaderboardRow> = call_count_by_caller
            .into_iter()
            .map(|(caller, call_count)| {
                let mut results = by_caller.remove(caller).unwrap_or_default();
                results.sort_by(|a, b| a.call_id.cmp(&b.call_id));
                row_for_caller(caller, call_count, &results)
            })
            .collect();

        sort_rows(&mut rows, sort_by);
        CallerLeaderboard { rows }
    }
}

fn row_for_caller(caller: &str, call_count: usize, results: &[&PolicyResult]) -> CallerLeaderboardRow {
    let mut returns: Vec<f64> = results.iter().map(|r| r.return_bps).collect();
    returns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut drawdowns: Vec<f64> = results.iter().map(|r| r.max_adverse_excursion_bps).collect();
    drawdowns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let eligible_count = results.len();
    let median_return_bps = percentile(&returns, 0.5).unwrap_or(0.0);
    let p95_return_bps = percentile(&returns, 0.95).unwrap_or(0.0);
    let p95_drawdown_bps = percentile(&drawdowns, 0.05).unwrap_or(0.0);
    let hit_rate = if eligible_count == 0 {
        0.0
    } else {
        results.iter().filter(|r| !r.stopped_out).count() as f64 / eligible_count as f64
    };
    let stop_out_rate = if eligible_count == 0 {
        0.0
    } else {
        results.iter().filter(|r| r.stopped_out).count() as f64 / eligible_count as f64
    };
    let avg_time_exposed_hours = if eligible_count == 0 {
        0.0
    } else {
        results.iter().map(|r| r.time_exposed_ms as f64).sum::<f64>() / eligible_count as f64 / 3_600_000.0
    };
    let tail_ratios: Vec<f64> = results.iter().filter_map(|r| r.tail_capture_ratio).collect();
    let avg_tail_capture_ratio =
        if tail_ratios.is_empty() { 0.0 } else { tail_ratios.iter().sum::<f64>() / tail_ratios.len() as f64 };

    CallerLeaderboardRow {
        caller: caller.to_string(),
        call_count,
        eligible_count,
        median_return_bps,
        p95_return_bps,
        hit_rate,
        p95_drawdown_bps,
        avg_time_exposed_hours,
        stop_out_rate,
        avg_tail_capture_ratio,
    }
}

fn sort_rows(rows: &mut [CallerLeaderboardRow], sort_by: SortField) {
    rows.sort_by(|a, b| {
        let ordering = match sort_by {
            SortField::MedianReturnBps => b.median_return_bps.partial_cmp(&a.median_return_bps),
            SortField::HitRate => b.hit_rate.partial_cmp(&a.hit_rate),
            SortField::CallCount => Some(b.call_count.cmp(&a.call_count)),
            SortField::P95DrawdownBps => b.p95_drawdown_bps.partial_cmp(&a.p95_drawdown_bps),
            SortField::P95ReturnBps => b.p95_return_bps.partial_cmp(&a.p95_return_bps),
            SortField::StopOutRate => b.stop_out_rate.partial_cmp(&a.stop_out_rate),
        };
        ordering.unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.caller.cmp(&b.caller))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::call::TokenRef;
    use crate::engine::model::metrics_types::ExitReason;

    fn call(id: &str, caller: &str) -> Call {
        Call::new(id, caller, TokenRef::new("0xabc", "solana"), 0)
    }

    fn result(call_id: &str, return_bps: f64) -> PolicyResult {
        result_with(call_id, return_bps, false, None)
    }

    fn result_with(call_id: &str, return_bps: f64, stopped_out: bool, tail_capture_ratio: Option<f64>) -> PolicyResult {
        PolicyResult {
            call_id: call_id.to_string(),
            policy_hash: "h".to_string(),
            return_bps,
            time_exposed_ms: 3_600_000,
            stopped_out,
            max_adverse_excursion_bps: -100.0,
            tail_capture_ratio,
            entry_price: 1.0,
            exit_price: 1.0,
            exit_reason: if stopped_out { ExitReason::StopLoss } else { ExitReason::TimeCap },
        }
    }

    #[test]
    fn test_groups_by_caller_and_computes_median() {
        let calls = vec![call("c1", "alice"), call("c2", "alice"), call("c3", "bob")];
        let results = vec![result("c1", 100.0), result("c2", 300.0), result("c3", -50.0)];
        let board = Aggregator::caller_leaderboard(&calls, &results, SortField::MedianReturnBps);
        assert_eq!(board.rows.len(), 2);
        let alice = board.rows.iter().find(|r| r.caller == "alice").unwrap();
        assert_eq!(alice.call_count, 2);
        assert_eq!(alice.median_return_bps, 200.0);
    }

    #[test]
    fn test_sort_by_median_return_descending() {
        let calls = vec![call("c1", "alice"), call("c2", "bob")];
        let results = vec![result("c1", -50.0), result("c2", 500.0)];
        let board = Aggregator::caller_leaderboard(&calls, &results, SortField::MedianReturnBps);
        assert_eq!(board.rows[0].caller, "bob");
        assert_eq!(board.rows[1].caller, "alice");
    }

    #[test]
    fn test_hit_rate_counts_non_stopped_out_calls() {
        // A losing-but-not-stopped-out call should still count as a hit;
        // hit rate tracks stop-outs, not the sign of the return.
        let calls = vec![call("c1", "alice"), call("c2", "alice"), call("c3", "alice")];
        let results = vec![result_with("c1", -20.0, false, None), result_with("c2", -100.0, true, None), result_with("c3", 50.0, false, None)];
        let board = Aggregator::caller_leaderboard(&calls, &results, SortField::HitRate);
        let alice = &board.rows[0];
        assert!((alice.hit_rate - (2.0 / 3.0)).abs() < 1e-9);
        assert!((alice.stop_out_rate - (1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_call_count_includes_ineligible_calls_eligible_count_does_not() {
        // Three calls attributed to alice, only two produced a policy
        // result — the third was excluded by coverage or never entered.
        let calls = vec![call("c1", "alice"), call("c2", "alice"), call("c3", "alice")];
        let results = vec![result("c1", 100.0), result("c2", 200.0)];
        let board = Aggregator::caller_leaderboard(&calls, &results, SortField::MedianReturnBps);
        let alice = &board.rows[0];
        assert_eq!(alice.call_count, 3);
        assert_eq!(alice.eligible_count, 2);
    }

    #[test]
    fn test_p95_return_and_avg_tail_capture_ratio() {
        let calls = vec![call("c1", "alice"), call("c2", "alice")];
        let results = vec![
            result_with("c1", 100.0, false, Some(0.5)),
            result_with("c2", 900.0, false, Some(0.9)),
        ];
        let board = Aggregator::caller_leaderboard(&calls, &results, SortField::P95ReturnBps);
        let alice = &board.rows[0];
        assert_eq!(alice.p95_return_bps, percentile(&[100.0, 900.0], 0.95).unwrap());
        assert!((alice.avg_tail_capture_ratio - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_sort_by_stop_out_rate_descending() {
        let calls = vec![call("c1", "alice"), call("c2", "bob")];
        let results = vec![result_with("c1", 0.0, false, None), result_with("c2", 0.0, true, None)];
        let board = Aggregator::caller_leaderboard(&calls, &results, SortField::StopOutRate);
        assert_eq!(board.rows[0].caller, "bob");
        assert_eq!(board.rows[1].caller, "alice");
    }
}
