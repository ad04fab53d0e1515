//! Capital-aware admission control (§4.J "V1 Baseline"). Trades are
//! simulated against a shared pool; a call that would exceed concurrency
//! or sizing is declined, never executed. Admission order is FIFO by
//! `(callTimestamp, callId)` (see DESIGN.md).

use serde::{Deserialize, Serialize};

use crate::engine::time::UnixMs;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalAwareConfig {
    pub initial_capital: f64,
    pub max_allocation_pct: f64,
    pub max_risk_per_trade_usd: f64,
    pub max_concurrent_positions: usize,
    pub min_executable_size_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionDecision {
    Admitted,
    DeclinedConcurrency,
    DeclinedAllocation,
    DeclinedBelowMinSize,
}

/// A pending or open allocation, ordered for FIFO admission by
/// `(call_timestamp, call_id)`.
#[derive(Debug, Clone)]
struct OpenAllocation {
    call_id: String,
    size_usd: f64,
}

/// Shared capital pool with admission control. Not thread-safe by design
/// — the Optimizer's capital-aware mode runs admission sequentially in
/// call order before fanning out the resulting admitted set for replay
/// (§4.J concurrency note: the only shared mutable state is the
/// aggregation fold, and admission is part of planning, not replay).
#[derive(Debug, Clone)]
pub struct CapitalPool {
    config: CapitalAwareConfig,
    deployed_usd: f64,
    open: Vec<OpenAllocation>,
}

impl CapitalPool {
    pub fn new(config: CapitalAwareConfig) -> Self {
        Self { config, deployed_usd: 0.0, open: Vec::new() }
    }

    pub fn available_usd(&self) -> f64 {
        (self.config.initial_capital - self.deployed_usd).max(0.0)
    }

    /// Decide whether `call_id` with a requested `size_usd` may enter,
    /// given calls are presented strictly in `(callTimestamp, callId)`
    /// order by the caller (§9).
    pub fn admit(&mut self, call_id: &str, size_usd: f64, _call_timestamp: UnixMs) -> AdmissionDecision {
        if size_usd < self.config.min_executable_size_usd {
            return AdmissionDecision::DeclinedBelowMinSize;
        }
        if self.open.len() >= self.config.max_concurrent_positions {
            return AdmissionDecision::DeclinedConcurrency;
        }
        let allocation_pct_cap = self.config.initial_capital * self.config.max_allocation_pct;
        let bounded_size = size_usd.min(self.config.max_risk_per_trade_usd);
        if bounded_size > self.available_usd() || self.deployed_usd + bounded_size > allocation_pct_cap {
            return AdmissionDecision::DeclinedAllocation;
        }

        self.deployed_usd += bounded_size;
        self.open.push(OpenAllocation { call_id: call_id.to_string(), size_usd: bounded_size });
        AdmissionDecision::Admitted
    }

    /// Release a closed position's capital back to the pool.
    pub fn release(&mut self, call_id: &str) {
        if let Some(idx) = self.open.iter().position(|a| a.call_id == call_id) {
            let allocation = self.open.remove(idx);
            self.deployed_usd -= allocation.size_usd;
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CapitalAwareConfig {
        CapitalAwareConfig {
            initial_capital: 10_000.0,
            max_allocation_pct: 0.5,
            max_risk_per_trade_usd: 1_000.0,
            max_concurrent_positions: 2,
            min_executable_size_usd: 50.0,
        }
    }

    #[test]
    fn test_admits_up_to_concurrency_limit() {
        let mut pool = CapitalPool::new(config());
        assert_eq!(pool.admit("c1", 500.0, 100), AdmissionDecision::Admitted);
        assert_eq!(pool.admit("c2", 500.0, 200), AdmissionDecision::Admitted);
        assert_eq!(pool.admit("c3", 500.0, 300), AdmissionDecision::DeclinedConcurrency);
    }

    #[test]
    fn test_declines_below_min_size() {
        let mut pool = CapitalPool::new(config());
        assert_eq!(pool.admit("c1", 10.0, 100), AdmissionDecision::DeclinedBelowMinSize);
    }

    #[test]
    fn test_declines_past_allocation_cap() {
        let mut pool = CapitalPool::new(config());
        // allocation cap is 50% of 10_000 = 5_000; max_risk_per_trade caps each at 1_000
        for i in 0..5 {
            pool.admit(&format!("c{i}"), 1_000.0, i as i64);
        }
        // five admits of 1_000 already hit the 5_000 cap (though concurrency of 2 would
        // have stopped it first) -- verify release frees room for a later admit
        let mut pool2 = CapitalPool::new(CapitalAwareConfig { max_concurrent_positions: 10, ..config() });
        for i in 0..5 {
            pool2.admit(&format!("c{i}"), 1_000.0, i as i64);
        }
        assert_eq!(pool2.admit("c5", 1_000.0, 5), AdmissionDecision::DeclinedAllocation);
        pool2.release("c0");
        assert_eq!(pool2.admit("c5", 1_000.0, 6), AdmissionDecision::Admitted);
    }
}
