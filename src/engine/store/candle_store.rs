//! Candle Store (§6, component A): bulk reads of OHLCV rows. Two real
//! implementations are expected in deployment (a columnar warehouse and a
//! day-partitioned archive fallback, §9); this crate ships the trait plus
//! an in-memory implementation used by tests and by callers who already
//! hold their candles in memory.

use async_trait::async_trait;

use crate::engine::errors::BacktestError;
use crate::engine::model::candle::{Candle, Interval};
use crate::engine::time::UnixSec;

/// Read-only access to historical OHLCV data. Implementations must return
/// candles sorted by timestamp; the engine does not re-sort on this path
/// (normalization happens once, in the Slice Materializer).
#[async_trait]
pub trait CandleStore: Send + Sync {
    async fn get_candles(
        &self,
        token_address: &str,
        chain: &str,
        from: UnixSec,
        to: UnixSec,
        interval: Interval,
    ) -> Result<Vec<Candle>, BacktestError>;

    /// Row count in range, without fetching the rows themselves — the
    /// Coverage Checker's only query (§4.D).
    async fn count_candles(
        &self,
        token_address: &str,
        chain: &str,
        from: UnixSec,
        to: UnixSec,
        interval: Interval,
    ) -> Result<u64, BacktestError>;
}

/// In-memory candle store keyed by (token_address, chain, interval).
/// Used by tests and by one-shot CLI invocations that already loaded
/// candles from a file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCandleStore {
    series: std::collections::HashMap<(String, String, Interval), Vec<Candle>>,
}

impl InMemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token_address: impl Into<String>, chain: impl Into<String>, interval: Interval, mut bars: Vec<Candle>) {
        bars.sort_by_key(|c| c.timestamp);
        self.series.insert((token_address.into(), chain.into(), interval), bars);
    }
}

#[async_trait]
impl CandleStore for InMemoryCandleStore {
    async fn get_candles(
        &self,
        token_address: &str,
        chain: &str,
        from: UnixSec,
        to: UnixSec,
        interval: Interval,
    ) -> Result<Vec<Candle>, BacktestError> {
        let key = (token_address.to_string(), chain.to_string(), interval);
        let bars = self
            .series
            .get(&key)
            .map(|bars| {
                bars.iter()
                    .filter(|c| c.timestamp >= from && c.timestamp <= to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        Ok(bars)
    }

    async fn count_candles(
        &self,
        token_address: &str,
        chain: &str,
        from: UnixSec,
        to: UnixSec,
        interval: Interval,
    ) -> Result<u64, BacktestError> {
        let candles = self.get_candles(token_address, chain, from, to, interval).await?;
        Ok(candles.len() as u64)
    }
}
