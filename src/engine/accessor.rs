//! Causal Candle Accessor (§4.F): a cursor over one token's candle vector
//! that makes the no-look-ahead invariant structurally enforceable. The
//! policy API and the replay loop only ever see this type, never the raw
//! `Vec<Candle>` — there is no method here that can return `bar[j]` with
//! `j > cursor`.

use crate::engine::model::candle::{Candle, CandleSeries};
use crate::engine::indicator;

/// Read-only cursor over a `CandleSeries`. `advance()` is the only mutator.
pub struct CausalAccessor<'a> {
    series: &'a CandleSeries,
    cursor: usize,
}

impl<'a> CausalAccessor<'a> {
    /// Build an accessor positioned at `start_index`. Panics if the series
    /// is empty or `start_index` is out of range — callers locate the
    /// entry bar before constructing the accessor.
    pub fn new(series: &'a CandleSeries, start_index: usize) -> Self {
        assert!(!series.bars.is_empty(), "CausalAccessor over empty series");
        assert!(start_index < series.bars.len(), "start_index out of range");
        Self { series, cursor: start_index }
    }

    /// The bar at the cursor.
    pub fn current(&self) -> &Candle {
        &self.series.bars[self.cursor]
    }

    /// Index of the cursor in the underlying series.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The last `k` bars up to and including the cursor, oldest first.
    /// Never includes a bar past the cursor.
    pub fn history(&self, k: usize) -> &[Candle] {
        let start = self.cursor.saturating_sub(k.saturating_sub(1).min(self.cursor));
        &self.series.bars[start..=self.cursor]
    }

    /// Whether another bar exists past the cursor.
    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.series.bars.len()
    }

    /// Move the cursor forward by one bar. Returns `false` (cursor
    /// unchanged) once the series is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.has_next() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Evaluate a named indicator over the causal history only (never the
    /// future tail of the series). Unknown names return `None`.
    pub fn indicator(&self, name: &str, params: &[f64]) -> Option<f64> {
        let closes: Vec<f64> = self.series.bars[..=self.cursor].iter().map(|c| c.close).collect();
        match name {
            "sma" => {
                let period = *params.first()? as usize;
                indicator::sma(&closes, period)
            }
            "rsi" => {
                let period = *params.first()? as usize;
                indicator::rsi(&closes, period)
            }
            _ => None,
        }
    }
}
