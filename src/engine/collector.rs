//! Metrics Collector (§4.I): folds bar-level observations into per-call
//! `PathMetrics`, and computes reproducible percentiles over a sorted fold
//! order (§5, §8 property 1).

use crate::engine::model::candle::CandleSeries;
use crate::engine::model::metrics_types::PathMetrics;
use crate::engine::time::UnixSec;

pub struct MetricsCollector;

impl MetricsCollector {
    /// Fold every bar from `entry_idx` to the end of `series` into
    /// policy-independent path metrics (§4.I). `series` is already bounded
    /// to the planned horizon by the Slice Materializer, so this always
    /// covers the full entry-to-horizon window regardless of where a
    /// policy's replay loop happened to exit — path metrics must not
    /// depend on the policy under evaluation. Starting at `entry_idx`
    /// (rather than bar 0) also keeps indicator-warmup bars, which precede
    /// entry in the materialized series, out of the "since entry" fold.
    pub fn path_metrics(call_id: impl Into<String>, entry_price: f64, series: &CandleSeries, entry_idx: usize, activity_move_pct: f64) -> PathMetrics {
        let entry_index_bars = &series.bars[entry_idx..];
        let mut peak_multiple = 1.0f64;
        let mut peak_since_entry = entry_price;
        let mut low_since_entry = entry_price;
        let mut max_drawdown_bps = 0.0f64;
        let mut time_to_2x = None;
        let mut time_to_3x = None;
        let mut time_to_4x = None;
        let mut drawdown_to_2x_bps = None;
        let mut alert_to_activity_sec: Option<UnixSec> = None;

        for bar in entry_index_bars {
            if bar.high > peak_since_entry {
                peak_since_entry = bar.high;
            }
            if bar.low < low_since_entry {
                low_since_entry = bar.low;
            }
            let dd = (low_since_entry - peak_since_entry) / peak_since_entry * 10_000.0;
            if dd < max_drawdown_bps {
                max_drawdown_bps = dd;
            }

            let multiple = bar.close / entry_price;
            if multiple > peak_multiple {
                peak_multiple = multiple;
            }

            if time_to_2x.is_none() && bar.high / entry_price >= 2.0 {
                time_to_2x = Some(bar.timestamp);
                drawdown_to_2x_bps = Some(max_drawdown_bps);
            }
            if time_to_3x.is_none() && bar.high / entry_price >= 3.0 {
                time_to_3x = Some(bar.timestamp);
            }
            if time_to_4x.is_none() && bar.high / entry_price >= 4.0 {
                time_to_4x = Some(bar.timestamp);
            }

            if alert_to_activity_sec.is_none() {
                let move_pct = ((bar.close - entry_price) / entry_price).abs();
                if move_pct >= activity_move_pct {
                    alert_to_activity_sec = Some(bar.timestamp);
                }
            }
        }

        let slow_activity = alert_to_activity_sec.is_none();

        PathMetrics {
            call_id: call_id.into(),
            peak_multiple,
            time_to_2x,
            time_to_3x,
            time_to_4x,
            max_drawdown_bps,
            drawdown_to_2x_bps,
            alert_to_activity_sec,
            slow_activity,
        }
    }
}

/// Linear-interpolation percentile over already-sorted values, with ties
/// broken by the prior index (§4.I, §5). `p` is in `[0, 1]`.
pub fn percentile(sorted_values: &[f64], p: f64) -> Option<f64> {
    if sorted_values.is_empty() {
        return None;
    }
    if sorted_values.len() == 1 {
        return Some(sorted_values[0]);
    }
    let rank = p.clamp(0.0, 1.0) * (sorted_values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Some(sorted_values[lower]);
    }
    let frac = rank - lower as f64;
    Some(sorted_values[lower] + (sorted_values[upper] - sorted_values[lower]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::candle::{Candle, CandleSeries, Interval};

    fn series_from(entry: f64, highs: &[f64]) -> CandleSeries {
        let mut s = CandleSeries::new("0xabc", "solana", Interval::OneMinute);
        s.bars.push(Candle { timestamp: 0, open: entry, high: entry, low: entry, close: entry, volume: 1.0 });
        for (i, h) in highs.iter().enumerate() {
            s.bars.push(Candle { timestamp: (i + 1) as i64, open: *h, high: *h, low: *h, close: *h, volume: 1.0 });
        }
        s
    }

    #[test]
    fn test_path_metrics_peak_multiple_and_time_to_2x() {
        let series = series_from(1.0, &[1.5, 2.5, 1.0]);
        let pm = MetricsCollector::path_metrics("c1", 1.0, &series, 0, 0.10);
        assert!(pm.peak_multiple >= 2.5);
        assert_eq!(pm.time_to_2x, Some(2));
    }

    #[test]
    fn test_path_metrics_independent_of_policy_exit_and_warmup_bars() {
        // Two warmup bars precede entry at index 2; the 3x touch happens
        // well after where an early-exiting policy's own cursor would have
        // stopped. Path metrics must still see it, and must not let the
        // warmup bars (which dip far below entry) pollute the drawdown.
        let mut s = CandleSeries::new("0xabc", "solana", Interval::OneMinute);
        s.bars.push(Candle { timestamp: -2, open: 0.1, high: 0.1, low: 0.1, close: 0.1, volume: 1.0 });
        s.bars.push(Candle { timestamp: -1, open: 0.1, high: 0.1, low: 0.1, close: 0.1, volume: 1.0 });
        s.bars.push(Candle { timestamp: 0, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 });
        s.bars.push(Candle { timestamp: 1, open: 1.1, high: 1.2, low: 1.0, close: 1.1, volume: 1.0 });
        s.bars.push(Candle { timestamp: 2, open: 1.1, high: 3.1, low: 1.1, close: 3.0, volume: 1.0 });

        let entry_idx = 2;
        let pm = MetricsCollector::path_metrics("c1", 1.0, &s, entry_idx, 0.10);
        assert_eq!(pm.time_to_3x, Some(2), "the 3x touch at the last bar must be visible regardless of any policy's exit cursor");
        assert_eq!(pm.max_drawdown_bps, 0.0, "drawdown since entry must not be polluted by the pre-entry warmup dip to 0.1");
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(4.0));
        assert_eq!(percentile(&values, 0.5), Some(2.5));
    }

    #[test]
    fn test_percentile_empty_is_none() {
        assert_eq!(percentile(&[], 0.5), None);
    }
}
