//! Coverage Checker (§4.D): classifies each planned window by how much of
//! its expected candle history actually exists, without ever fetching
//! the candles themselves.

use serde::{Deserialize, Serialize};

use crate::engine::errors::BacktestError;
use crate::engine::planner::BacktestPlan;
use crate::engine::store::candle_store::CandleStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageStatus {
    Eligible,
    Insufficient,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub call_id: String,
    pub status: CoverageStatus,
    pub ratio: f64,
    pub observed_bars: u64,
    pub expected_bars: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub reports: Vec<CoverageReport>,
    pub eligible_call_ids: Vec<String>,
    pub excluded_count: usize,
}

pub struct CoverageChecker;

impl CoverageChecker {
    /// Classify every window in `plan`. Reports are emitted in plan order
    /// (callId order as given), never re-sorted here — callers that need
    /// a deterministic fold order do that sort themselves (§5).
    pub async fn check(
        plan: &BacktestPlan,
        store: &dyn CandleStore,
        min_coverage_pct: f64,
    ) -> Result<EligibilityReport, BacktestError> {
        let mut report = EligibilityReport::default();

        for window in &plan.per_call_window {
            let expected_bars = expected_bars(window.from, window.to, window.interval_seconds);
            let observed_bars = store
                .count_candles(
                    &window.token.address,
                    &window.token.chain,
                    window.from / 1000,
                    window.to / 1000,
                    interval_for_seconds(window.interval_seconds)?,
                )
                .await?;

            let ratio = if expected_bars == 0 { 0.0 } else { observed_bars as f64 / expected_bars as f64 };
            let status = if observed_bars == 0 {
                CoverageStatus::Missing
            } else if ratio >= min_coverage_pct {
                CoverageStatus::Eligible
            } else {
                CoverageStatus::Insufficient
            };

            if status == CoverageStatus::Eligible {
                report.eligible_call_ids.push(window.call_id.clone());
            } else {
                report.excluded_count += 1;
            }

            report.reports.push(CoverageReport {
                call_id: window.call_id.clone(),
                status,
                ratio,
                observed_bars,
                expected_bars,
            });
        }

        Ok(report)
    }
}

fn expected_bars(from: i64, to: i64, interval_seconds: u32) -> u64 {
    if to <= from || interval_seconds == 0 {
        return 0;
    }
    let span_ms = (to - from) as f64;
    let bar_ms = interval_seconds as f64 * 1000.0;
    (span_ms / bar_ms).ceil() as u64
}

fn interval_for_seconds(seconds: u32) -> Result<crate::engine::model::candle::Interval, BacktestError> {
    use crate::engine::model::candle::Interval;
    [
        Interval::Sec15,
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::OneHour,
        Interval::FourHours,
        Interval::OneDay,
    ]
    .into_iter()
    .find(|i| i.seconds_per_bar() == seconds as i64)
    .ok_or_else(|| BacktestError::Configuration(format!("no known interval has {seconds} seconds per bar")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::call::{Call, TokenRef};
    use crate::engine::model::candle::{Candle, Interval};
    use crate::engine::planner::{Planner, PlannerInputs};
    use crate::engine::store::candle_store::InMemoryCandleStore;

    fn bar(ts: i64) -> Candle {
        Candle { timestamp: ts, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 }
    }

    #[tokio::test]
    async fn test_s5_coverage_gate() {
        // window expects 288 bars (1 day at 5m), observed 200 -> ineligible at 0.80
        let call = Call::new("c1", "alice", TokenRef::new("0xabc", "solana"), 0);
        let inputs = PlannerInputs {
            calls: vec![call],
            interval: Interval::FiveMinutes,
            entry_delay_ms: 0,
            indicator_warmup_candles: 0,
            horizon_candles: 288,
        };
        let plan = Planner::plan(&inputs).unwrap();

        let mut store = InMemoryCandleStore::new();
        let bars: Vec<Candle> = (0..200).map(|i| bar(i * 300)).collect();
        store.insert("0xabc", "solana", Interval::FiveMinutes, bars);

        let report = CoverageChecker::check(&plan, &store, 0.80).await.unwrap();
        assert_eq!(report.reports[0].status, CoverageStatus::Insufficient);
        assert_eq!(report.excluded_count, 1);

        // fix: observed 240 -> eligible
        let mut store2 = InMemoryCandleStore::new();
        let bars2: Vec<Candle> = (0..240).map(|i| bar(i * 300)).collect();
        store2.insert("0xabc", "solana", Interval::FiveMinutes, bars2);
        let report2 = CoverageChecker::check(&plan, &store2, 0.80).await.unwrap();
        assert_eq!(report2.reports[0].status, CoverageStatus::Eligible);
        assert_eq!(report2.excluded_count, 0);
    }

    #[tokio::test]
    async fn test_missing_when_zero_observed() {
        let call = Call::new("c1", "alice", TokenRef::new("0xabc", "solana"), 0);
        let inputs = PlannerInputs {
            calls: vec![call],
            interval: Interval::OneMinute,
            entry_delay_ms: 0,
            indicator_warmup_candles: 0,
            horizon_candles: 10,
        };
        let plan = Planner::plan(&inputs).unwrap();
        let store = InMemoryCandleStore::new();
        let report = CoverageChecker::check(&plan, &store, 0.80).await.unwrap();
        assert_eq!(report.reports[0].status, CoverageStatus::Missing);
    }
}
