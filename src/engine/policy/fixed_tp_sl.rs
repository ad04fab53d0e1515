//! `fixed_tp_sl` policy (§4.H): single take-profit, single stop-loss.

use serde::{Deserialize, Serialize};

use crate::engine::action::Action;
use crate::engine::model::metrics_types::ExitReason;
use crate::engine::policy::{BarContext, TieBreak};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedTpSl {
    pub tp_mult: f64,
    pub sl_mult: f64,
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl FixedTpSl {
    pub fn new(tp_mult: f64, sl_mult: f64) -> Self {
        Self {
            tp_mult,
            sl_mult,
            tie_break: TieBreak::default(),
        }
    }

    pub fn on_bar(&self, ctx: &BarContext) -> Vec<Action> {
        let tp = ctx.entry_price * self.tp_mult;
        let sl = ctx.entry_price * self.sl_mult;
        let tp_touched = ctx.bar.touches(tp);
        let sl_touched = ctx.bar.touches(sl);
        let action = match (tp_touched, sl_touched) {
            (true, true) => match self.tie_break {
                TieBreak::StopFirst => Action::ExitFull(sl, ExitReason::StopLoss),
                TieBreak::TargetFirst => Action::ExitFull(tp, ExitReason::TakeProfit),
            },
            (true, false) => Action::ExitFull(tp, ExitReason::TakeProfit),
            (false, true) => Action::ExitFull(sl, ExitReason::StopLoss),
            (false, false) => Action::HoldOn,
        };
        vec![action]
    }
}
