//! `time_cap` policy (§4.H): forces exit-at-close once elapsed time since
//! entry reaches `max_hold_ms`.

use serde::{Deserialize, Serialize};

use crate::engine::action::Action;
use crate::engine::model::metrics_types::ExitReason;
use crate::engine::policy::BarContext;
use crate::engine::time::UnixMs;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeCap {
    pub max_hold_ms: UnixMs,
}

impl TimeCap {
    pub fn new(max_hold_ms: UnixMs) -> Self {
        Self { max_hold_ms }
    }

    pub fn on_bar(&self, ctx: &BarContext) -> Vec<Action> {
        if ctx.elapsed_ms >= self.max_hold_ms {
            vec![Action::ExitFull(ctx.bar.close, ExitReason::TimeCap)]
        } else {
            vec![Action::HoldOn]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::candle::Candle;

    fn bar() -> Candle {
        Candle { timestamp: 1, open: 1.0, high: 1.0, low: 1.0, close: 1.05, volume: 1.0 }
    }

    #[test]
    fn test_holds_before_cap() {
        let p = TimeCap::new(60_000);
        let ctx = BarContext { bar: bar(), entry_price: 1.0, elapsed_ms: 30_000, bar_index: 1 };
        assert_eq!(p.on_bar(&ctx), vec![Action::HoldOn]);
    }

    #[test]
    fn test_exits_at_cap() {
        let p = TimeCap::new(60_000);
        let ctx = BarContext { bar: bar(), entry_price: 1.0, elapsed_ms: 60_000, bar_index: 5 };
        assert_eq!(p.on_bar(&ctx), vec![Action::ExitFull(1.05, ExitReason::TimeCap)]);
    }
}
