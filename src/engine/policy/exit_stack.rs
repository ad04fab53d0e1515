//! `exit_stack` policy (§4.H): an ordered list of layers. The first layer
//! to return a non-`HoldOn` action set wins; layers that hold are
//! consulted in order until one acts or the stack is exhausted.

use crate::engine::action::Action;
use crate::engine::model::metrics_types::ExitReason;
use crate::engine::model::position::Position;
use crate::engine::policy::{BarContext, Policy};

pub type ExitStack = Vec<Policy>;

pub fn on_bar(layers: &[Policy], ctx: &BarContext, position: &mut Position) -> Vec<Action> {
    for layer in layers {
        let actions = layer.on_bar(ctx, position);
        if actions.iter().any(|a| !matches!(a, Action::HoldOn)) {
            return actions;
        }
    }
    vec![Action::HoldOn]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::candle::Candle;
    use crate::engine::policy::{fixed_tp_sl::FixedTpSl, time_cap::TimeCap};

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle { timestamp: 1, open: o, high: h, low: l, close: c, volume: 1.0 }
    }

    #[test]
    fn test_first_acting_layer_wins() {
        let layers = vec![
            Policy::TimeCap(TimeCap::new(1_000_000)),
            Policy::FixedTpSl(FixedTpSl::new(2.0, 0.5)),
        ];
        let mut pos = Position::open(1.0, 0);
        let ctx = BarContext {
            bar: bar(1.05, 2.10, 0.95, 1.10),
            entry_price: 1.0,
            elapsed_ms: 1_000,
            bar_index: 1,
        };
        let actions = on_bar(&layers, &ctx, &mut pos);
        assert_eq!(actions, vec![Action::ExitFull(2.0, ExitReason::TakeProfit)]);
    }

    #[test]
    fn test_all_hold_propagates_hold() {
        let layers = vec![Policy::TimeCap(TimeCap::new(1_000_000))];
        let mut pos = Position::open(1.0, 0);
        let ctx = BarContext { bar: bar(1.0, 1.01, 0.99, 1.0), entry_price: 1.0, elapsed_ms: 1_000, bar_index: 1 };
        assert_eq!(on_bar(&layers, &ctx, &mut pos), vec![Action::HoldOn]);
    }
}
