//! Slice Materializer (§4.E): builds the immutable, content-addressed
//! columnar artifact that Replay and the Optimizer re-read many times.
//! Schema and on-disk layout from §6; the backing format is `bincode`
//! rather than Parquet, since no Arrow/Parquet crate is available here
//! (documented in DESIGN.md).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::coverage::EligibilityReport;
use crate::engine::errors::BacktestError;
use crate::engine::hashing::{content_hash, ContentHash};
use crate::engine::model::candle::{Candle, CandleSeries, Interval};
use crate::engine::planner::BacktestPlan;
use crate::engine::store::candle_store::CandleStore;

pub const SLICE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowGroup {
    pub token_address: String,
    pub chain: String,
    pub candles: Vec<Candle>,
}

/// Content-addressed, immutable columnar artifact (§3, §4.E). Row groups
/// are ordered by (token_address, chain) for deterministic serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub content_hash: ContentHash,
    pub schema_version: u32,
    pub interval_seconds: u32,
    pub row_groups: Vec<RowGroup>,
}

impl Slice {
    /// Materialize a borrowed `CandleSeries` view for a (token, chain)
    /// row group, or `None` if absent from the slice.
    pub fn series(&self, token_address: &str, chain: &str) -> Option<CandleSeries> {
        let interval = interval_from_seconds(self.interval_seconds);
        self.row_groups.iter().find(|g| g.token_address == token_address && g.chain == chain).map(|g| {
            let mut series = CandleSeries::new(g.token_address.clone(), g.chain.clone(), interval);
            series.bars = g.candles.clone();
            series
        })
    }

    pub fn file_name(&self) -> String {
        format!("{}.slice", self.content_hash)
    }

    pub fn write_to(&self, base_dir: impl AsRef<Path>) -> Result<(), BacktestError> {
        let path = base_dir.as_ref().join(self.file_name());
        let bytes = bincode::serialize(self)
            .map_err(|e| BacktestError::DataIntegrity(format!("slice serialization failed: {e}")))?;
        std::fs::write(&path, bytes)
            .map_err(|e| BacktestError::TransientStore(format!("failed to write slice {}: {e}", path.display())))?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, BacktestError> {
        let bytes = std::fs::read(&path)
            .map_err(|e| BacktestError::TransientStore(format!("failed to read slice {}: {e}", path.as_ref().display())))?;
        bincode::deserialize(&bytes)
            .map_err(|e| BacktestError::DataIntegrity(format!("slice deserialization failed: {e}")))
    }
}

fn interval_from_seconds(seconds: u32) -> Interval {
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
    .unwrap_or(Interval::OneMinute)
}

pub struct SliceMaterializer;

#[derive(Serialize)]
struct HashInput<'a> {
    schema_version: u32,
    interval_seconds: u32,
    windows: &'a [(String, String, String, i64, i64)],
}

impl SliceMaterializer {
    /// Fetch candles for every eligible window, group by (token, chain),
    /// normalize, and hash the result of the planning inputs (not the
    /// fetched candles — two runs against a growing store with identical
    /// planning inputs should key to the same cache entry, §4.E).
    pub async fn materialize(
        plan: &BacktestPlan,
        eligibility: &EligibilityReport,
        store: &dyn CandleStore,
    ) -> Result<Slice, BacktestError> {
        let eligible: std::collections::HashSet<&str> =
            eligibility.eligible_call_ids.iter().map(|s| s.as_str()).collect();

        let mut by_token: BTreeMap<(String, String), Vec<Candle>> = BTreeMap::new();
        let mut hash_windows: Vec<(String, String, String, i64, i64)> = Vec::new();

        let mut eligible_windows: Vec<_> =
            plan.per_call_window.iter().filter(|w| eligible.contains(w.call_id.as_str())).collect();
        eligible_windows.sort_by(|a, b| a.call_id.cmp(&b.call_id));

        for window in &eligible_windows {
            hash_windows.push((
                window.call_id.clone(),
                window.token.address.clone(),
                window.token.chain.clone(),
                window.from,
                window.to,
            ));

            let key = (window.token.address.clone(), window.token.chain.clone());
            let interval = interval_from_seconds(plan.interval_seconds);
            let candles = store
                .get_candles(&window.token.address, &window.token.chain, window.from / 1000, window.to / 1000, interval)
                .await?;
            by_token.entry(key).or_default().extend(candles);
        }

        let mut row_groups = Vec::with_capacity(by_token.len());
        for ((token_address, chain), mut candles) in by_token {
            let mut series = CandleSeries::new(token_address.clone(), chain.clone(), interval_from_seconds(plan.interval_seconds));
            series.bars.append(&mut candles);
            series.normalize();
            row_groups.push(RowGroup { token_address, chain, candles: series.bars });
        }

        let hash_input = HashInput { schema_version: SLICE_SCHEMA_VERSION, interval_seconds: plan.interval_seconds, windows: &hash_windows };
        let hash = content_hash(&hash_input);

        Ok(Slice { content_hash: hash, schema_version: SLICE_SCHEMA_VERSION, interval_seconds: plan.interval_seconds, row_groups })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::call::{Call, TokenRef};
    use crate::engine::model::candle::Interval;
    use crate::engine::planner::{Planner, PlannerInputs};
    use crate::engine::store::candle_store::InMemoryCandleStore;

    fn bar(ts: i64) -> Candle {
        Candle { timestamp: ts, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 }
    }

    #[tokio::test]
    async fn test_materialize_is_deterministic() {
        let call = Call::new("c1", "alice", TokenRef::new("0xabc", "solana"), 0);
        let inputs = PlannerInputs {
            calls: vec![call],
            interval: Interval::OneMinute,
            entry_delay_ms: 0,
            indicator_warmup_candles: 0,
            horizon_candles: 5,
        };
        let plan = Planner::plan(&inputs).unwrap();
        let mut store = InMemoryCandleStore::new();
        store.insert("0xabc", "solana", Interval::OneMinute, (0..10).map(|i| bar(i * 60)).collect());

        let eligibility = EligibilityReport {
            reports: vec![],
            eligible_call_ids: vec!["c1".to_string()],
            excluded_count: 0,
        };

        let slice_a = SliceMaterializer::materialize(&plan, &eligibility, &store).await.unwrap();
        let slice_b = SliceMaterializer::materialize(&plan, &eligibility, &store).await.unwrap();
        assert_eq!(slice_a.content_hash, slice_b.content_hash);
        assert_eq!(slice_a, slice_b);
    }

    #[tokio::test]
    async fn test_ineligible_calls_excluded_from_row_groups() {
        let call = Call::new("c1", "alice", TokenRef::new("0xabc", "solana"), 0);
        let inputs = PlannerInputs {
            calls: vec![call],
            interval: Interval::OneMinute,
            entry_delay_ms: 0,
            indicator_warmup_candles: 0,
            horizon_candles: 5,
        };
        let plan = Planner::plan(&inputs).unwrap();
        let store = InMemoryCandleStore::new();
        let eligibility = EligibilityReport::default(); // nothing eligible
        let slice = SliceMaterializer::materialize(&plan, &eligibility, &store).await.unwrap();
        assert!(slice.row_groups.is_empty());
    }
}
