//! `RiskPolicy` (§4.H): a composite wrapping any exit policy with the
//! entry-timing and cost parameters the engine applies uniformly,
//! regardless of which policy kind is underneath.

use serde::{Deserialize, Serialize};

use crate::engine::policy::{Fees, Policy};
use crate::engine::time::UnixMs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicy {
    pub inner: Policy,
    pub entry_delay_ms: UnixMs,
    pub fees: Fees,
    pub size_usd: f64,
}

impl RiskPolicy {
    pub fn new(inner: Policy, entry_delay_ms: UnixMs, fees: Fees, size_usd: f64) -> Self {
        Self { inner, entry_delay_ms, fees, size_usd }
    }

    /// Apply taker fee and slippage symmetrically to a raw fill price, in
    /// the direction that worsens the fill (§4.G step 2/6).
    pub fn apply_entry_costs(&self, raw_price: f64) -> f64 {
        raw_price * (1.0 + self.fees.slippage_bps / 1e4) * (1.0 + self.fees.taker_bps / 1e4)
    }

    pub fn apply_exit_costs(&self, raw_price: f64) -> f64 {
        raw_price * (1.0 - self.fees.slippage_bps / 1e4) * (1.0 - self.fees.taker_bps / 1e4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::policy::fixed_tp_sl::FixedTpSl;

    #[test]
    fn test_entry_costs_worsen_fill() {
        let rp = RiskPolicy::new(
            Policy::FixedTpSl(FixedTpSl::new(2.0, 0.5)),
            500,
            Fees { taker_bps: 10.0, slippage_bps: 5.0 },
            1000.0,
        );
        let filled = rp.apply_entry_costs(1.0);
        assert!(filled > 1.0);
    }

    #[test]
    fn test_exit_costs_worsen_fill() {
        let rp = RiskPolicy::new(
            Policy::FixedTpSl(FixedTpSl::new(2.0, 0.5)),
            500,
            Fees { taker_bps: 10.0, slippage_bps: 5.0 },
            1000.0,
        );
        let filled = rp.apply_exit_costs(1.0);
        assert!(filled < 1.0);
    }
}
