//! Exit Policy Library (§4.H): a closed tagged variant, not a class
//! hierarchy. The engine dispatches on `PolicyKind`; a runtime string-keyed
//! registry exists only at the CLI boundary for parsing user JSON (§9).

pub mod exit_stack;
pub mod fixed_tp_sl;
pub mod risk_policy;
pub mod time_cap;
pub mod trailing_stop;
pub mod tranche_ladder;

use serde::{Deserialize, Serialize};

use crate::engine::action::Action;
use crate::engine::hashing::{content_hash, ContentHash};
use crate::engine::model::candle::Candle;
use crate::engine::model::position::Position;
use crate::engine::time::{UnixMs, UnixSec};

pub use exit_stack::ExitStack;
pub use fixed_tp_sl::FixedTpSl;
pub use risk_policy::RiskPolicy;
pub use time_cap::TimeCap;
pub use trailing_stop::TrailingStop;
pub use tranche_ladder::TrancheLadder;

/// Which side wins when both a stop and a target are touched in the same
/// bar (§4.G step 5). Part of the policy's hashed configuration, not a
/// global default, so two runs that disagree on this produce distinct
/// content hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieBreak {
    StopFirst,
    TargetFirst,
}

impl Default for TieBreak {
    fn default() -> Self {
        TieBreak::StopFirst
    }
}

/// Everything a policy needs to decide on the current bar, aside from the
/// mutable `Position` it is handed alongside.
#[derive(Debug, Clone, Copy)]
pub struct BarContext {
    pub bar: Candle,
    pub entry_price: f64,
    pub elapsed_ms: UnixMs,
    pub bar_index: usize,
}

/// The discriminant of a `Policy`, reported in diagnostics and run
/// manifests without needing to serialize the whole configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyKind {
    FixedTpSl,
    TimeCap,
    TrailingStop,
    TrancheLadder,
    ExitStack,
}

/// Closed set of exit algorithms (§9 redesign guidance: tagged variant in
/// place of a class hierarchy). `ExitStack` nests other policies; nesting
/// recurses through `Vec<Policy>`, which is already heap-indirected, so no
/// `Box` is needed to close the recursive type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Policy {
    FixedTpSl(FixedTpSl),
    TimeCap(TimeCap),
    TrailingStop(TrailingStop),
    TrancheLadder(TrancheLadder),
    ExitStack(Vec<Policy>),
}

impl Policy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::FixedTpSl(_) => PolicyKind::FixedTpSl,
            Policy::TimeCap(_) => PolicyKind::TimeCap,
            Policy::TrailingStop(_) => PolicyKind::TrailingStop,
            Policy::TrancheLadder(_) => PolicyKind::TrancheLadder,
            Policy::ExitStack(_) => PolicyKind::ExitStack,
        }
    }

    /// Content hash of this policy's configuration, including its tie-break
    /// field where applicable (§4.H, §9 open question on tie-break).
    pub fn content_hash(&self) -> ContentHash {
        content_hash(self)
    }

    /// Dispatch to the variant's own transition function. `ExitStack`
    /// consults its layers in order and returns the first layer's actions
    /// that are not a lone `HoldOn` (§4.H).
    pub fn on_bar(&self, ctx: &BarContext, position: &mut Position) -> Vec<Action> {
        match self {
            Policy::FixedTpSl(p) => p.on_bar(ctx),
            Policy::TimeCap(p) => p.on_bar(ctx),
            Policy::TrailingStop(p) => p.on_bar(ctx, position),
            Policy::TrancheLadder(p) => p.on_bar(ctx, position),
            Policy::ExitStack(layers) => exit_stack::on_bar(layers, ctx, position),
        }
    }

    pub fn on_entry(&self, _position: &Position) {}
}

/// Per-trade cost model applied uniformly by the engine, never by the
/// policy (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fees {
    pub taker_bps: f64,
    pub slippage_bps: f64,
}

pub type TrancheId = crate::engine::model::position::TrancheId;
pub type SecOrMs = UnixSec;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let p = Policy::FixedTpSl(FixedTpSl {
            tp_mult: 2.0,
            sl_mult: 0.5,
            tie_break: TieBreak::StopFirst,
        });
        assert_eq!(p.kind(), PolicyKind::FixedTpSl);
    }

    #[test]
    fn test_content_hash_changes_with_tie_break() {
        let a = Policy::FixedTpSl(FixedTpSl {
            tp_mult: 2.0,
            sl_mult: 0.5,
            tie_break: TieBreak::StopFirst,
        });
        let b = Policy::FixedTpSl(FixedTpSl {
            tp_mult: 2.0,
            sl_mult: 0.5,
            tie_break: TieBreak::TargetFirst,
        });
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
