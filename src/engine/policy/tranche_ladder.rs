//! `tranche_ladder` policy (§4.H): takes a fraction off at each of a
//! series of multiples, with the residual either ridden to horizon or
//! closed once the ladder is exhausted.

use serde::{Deserialize, Serialize};

use crate::engine::action::Action;
use crate::engine::model::metrics_types::ExitReason;
use crate::engine::model::position::{Position, TrancheId};
use crate::engine::policy::BarContext;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrancheStep {
    pub mult: f64,
    pub frac: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Residual {
    Ride,
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheLadder {
    pub tranches: Vec<TrancheStep>,
    pub residual: Residual,
}

impl TrancheLadder {
    pub fn new(tranches: Vec<TrancheStep>, residual: Residual) -> Self {
        Self { tranches, residual }
    }

    pub fn on_bar(&self, ctx: &BarContext, position: &mut Position) -> Vec<Action> {
        for (idx, step) in self.tranches.iter().enumerate() {
            let id = idx as TrancheId;
            if position.exited_tranches.contains(&id) {
                continue;
            }
            let target = ctx.entry_price * step.mult;
            if ctx.bar.touches(target) {
                return vec![Action::ExitTranche(id, step.frac, target, ExitReason::TrancheTarget)];
            }
        }

        let ladder_exhausted = self.tranches.iter().enumerate().all(|(idx, _)| {
            position.exited_tranches.contains(&(idx as TrancheId))
        });
        if ladder_exhausted && self.residual == Residual::Close && !position.is_closed() {
            return vec![Action::ExitFull(ctx.bar.close, ExitReason::TrancheTarget)];
        }

        vec![Action::HoldOn]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::candle::Candle;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle { timestamp: 1, open: o, high: h, low: l, close: c, volume: 1.0 }
    }

    fn ladder() -> TrancheLadder {
        TrancheLadder::new(
            vec![TrancheStep { mult: 1.5, frac: 0.5 }, TrancheStep { mult: 2.0, frac: 0.5 }],
            Residual::Close,
        )
    }

    #[test]
    fn test_first_tranche_fires_on_touch() {
        let p = ladder();
        let mut pos = Position::open(1.0, 0);
        let ctx = BarContext { bar: bar(1.4, 1.6, 1.3, 1.55), entry_price: 1.0, elapsed_ms: 0, bar_index: 1 };
        let actions = p.on_bar(&ctx, &mut pos);
        assert_eq!(actions, vec![Action::ExitTranche(0, 0.5, 1.5, ExitReason::TrancheTarget)]);
    }

    #[test]
    fn test_residual_closes_after_ladder_exhausted() {
        let p = ladder();
        let mut pos = Position::open(1.0, 0);
        pos.exited_tranches.insert(0);
        pos.exited_tranches.insert(1);
        pos.reduce(1.0);
        let ctx = BarContext { bar: bar(2.1, 2.2, 2.0, 2.1), entry_price: 1.0, elapsed_ms: 0, bar_index: 5 };
        // position already fully reduced; ladder exhausted but position is
        // closed, so no forced residual exit is emitted
        assert_eq!(p.on_bar(&ctx, &mut pos), vec![Action::HoldOn]);
    }

    #[test]
    fn test_residual_ride_never_forces_exit() {
        let p = TrancheLadder::new(vec![TrancheStep { mult: 1.5, frac: 1.0 }], Residual::Ride);
        let mut pos = Position::open(1.0, 0);
        pos.exited_tranches.insert(0);
        let ctx = BarContext { bar: bar(2.1, 2.2, 2.0, 2.1), entry_price: 1.0, elapsed_ms: 0, bar_index: 5 };
        assert_eq!(p.on_bar(&ctx, &mut pos), vec![Action::HoldOn]);
    }
}
