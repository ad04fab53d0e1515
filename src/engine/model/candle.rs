//! Candle entity (§3) and its containing series.

pub use crate::engine::time::Interval;
use crate::engine::time::UnixSec;
use serde::{Deserialize, Serialize};

/// A single OHLCV bar. Within a bar, low-to-high traversal order is
/// unknown — touch-ordering is a policy decision (§4.G step 5), never
/// assumed here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: UnixSec,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// A bar is malformed if it has a negative low or an inverted range
    /// (§4.G edge cases). `low == 0.0` is explicitly malformed per spec.
    pub fn is_malformed(&self) -> bool {
        self.low <= 0.0
            || self.high < self.low
            || self.open < 0.0
            || self.close < 0.0
            || self.volume < 0.0
    }

    /// Whether a touch price `p` falls within this bar's [low, high] range
    /// (inclusive), the realization test used throughout §4.G.
    pub fn touches(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }
}

/// A sorted, strictly-increasing sequence of candles for one (token, chain,
/// interval). Gaps may exist; duplicated adjacent timestamps are coalesced
/// by keeping the first occurrence (§4.G edge cases).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandleSeries {
    pub token_address: String,
    pub chain: String,
    pub interval: Option<Interval>,
    pub bars: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(token_address: impl Into<String>, chain: impl Into<String>, interval: Interval) -> Self {
        Self {
            token_address: token_address.into(),
            chain: chain.into(),
            interval: Some(interval),
            bars: Vec::new(),
        }
    }

    /// Sort by timestamp and coalesce duplicate adjacent timestamps,
    /// keeping the first occurrence. Returns whether the input was already
    /// monotonic (non-monotonicity after coalescing is a fatal
    /// `DataIntegrityError` for the calling replay, not for this method).
    pub fn normalize(&mut self) -> bool {
        self.bars.sort_by_key(|c| c.timestamp);
        let mut out: Vec<Candle> = Vec::with_capacity(self.bars.len());
        let mut was_strictly_increasing = true;
        for bar in self.bars.drain(..) {
            match out.last() {
                Some(prev) if prev.timestamp == bar.timestamp => {
                    was_strictly_increasing = false;
                }
                Some(prev) if prev.timestamp > bar.timestamp => {
                    unreachable!("sort_by_key guarantees non-decreasing order")
                }
                _ => out.push(bar),
            }
        }
        self.bars = out;
        was_strictly_increasing
    }

    /// Whether the series is strictly increasing in timestamp (the
    /// invariant the Replay Engine requires before it will run).
    pub fn is_strictly_monotonic(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
    }

    /// Index of the first bar with `timestamp >= at`, if any.
    pub fn first_index_at_or_after(&self, at: UnixSec) -> Option<usize> {
        let idx = self.bars.partition_point(|c| c.timestamp < at);
        if idx < self.bars.len() {
            Some(idx)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle {
            timestamp: ts,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 1.0,
        }
    }

    #[test]
    fn test_malformed_detection() {
        assert!(bar(0, 1.0, 1.0, 0.0, 1.0).is_malformed());
        assert!(bar(0, 1.0, 0.5, 1.0, 1.0).is_malformed());
        assert!(!bar(0, 1.0, 1.1, 0.9, 1.0).is_malformed());
    }

    #[test]
    fn test_touches() {
        let b = bar(0, 1.0, 1.2, 0.8, 1.0);
        assert!(b.touches(1.1));
        assert!(b.touches(0.8));
        assert!(b.touches(1.2));
        assert!(!b.touches(1.3));
    }

    #[test]
    fn test_normalize_coalesces_duplicates() {
        let mut series = CandleSeries::new("0xabc", "solana", Interval::OneMinute);
        series.bars = vec![
            bar(2, 1.0, 1.0, 1.0, 1.0),
            bar(1, 0.9, 0.9, 0.9, 0.9),
            bar(1, 0.95, 0.95, 0.95, 0.95), // duplicate timestamp, dropped
        ];
        let was_monotonic = series.normalize();
        assert!(!was_monotonic);
        assert_eq!(series.bars.len(), 2);
        assert_eq!(series.bars[0].timestamp, 1);
        assert_eq!(series.bars[0].open, 0.9); // first occurrence kept
        assert!(series.is_strictly_monotonic());
    }

    #[test]
    fn test_first_index_at_or_after() {
        let mut series = CandleSeries::new("0xabc", "solana", Interval::OneMinute);
        series.bars = vec![bar(10, 1.0, 1.0, 1.0, 1.0), bar(20, 1.0, 1.0, 1.0, 1.0), bar(30, 1.0, 1.0, 1.0, 1.0)];
        assert_eq!(series.first_index_at_or_after(15), Some(1));
        assert_eq!(series.first_index_at_or_after(30), Some(2));
        assert_eq!(series.first_index_at_or_after(31), None);
    }
}
