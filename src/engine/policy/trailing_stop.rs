//! `trailing_stop` policy (§4.H): arms once price reaches `entry * arm_at`,
//! then trails `peak * (1 - trail_pct)`. The stop only ever rises —
//! `Position::raise_stop` enforces that (§8 property: stop never
//! decreases).
//!
//! Assumes the replay loop has already called `position.observe_bar` for
//! the current bar before invoking this, so `high_water_mark` reflects the
//! current bar's high.

use serde::{Deserialize, Serialize};

use crate::engine::action::Action;
use crate::engine::model::metrics_types::ExitReason;
use crate::engine::model::position::Position;
use crate::engine::policy::BarContext;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    pub arm_at: f64,
    pub trail_pct: f64,
}

impl TrailingStop {
    pub fn new(arm_at: f64, trail_pct: f64) -> Self {
        Self { arm_at, trail_pct }
    }

    pub fn on_bar(&self, ctx: &BarContext, position: &mut Position) -> Vec<Action> {
        let already_armed = position.armed_stop.is_some();
        if already_armed || ctx.bar.high >= ctx.entry_price * self.arm_at {
            let candidate = position.high_water_mark * (1.0 - self.trail_pct);
            position.raise_stop(candidate);
        }

        match position.armed_stop {
            Some(stop) if ctx.bar.low <= stop => vec![Action::ExitFull(stop, ExitReason::TrailingStop)],
            Some(stop) => vec![Action::AdjustStop(stop)],
            None => vec![Action::HoldOn],
        }
    }
}
