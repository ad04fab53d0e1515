//! Action (§4.G): the closed set of effects a Policy can request on a bar.

use serde::{Deserialize, Serialize};

use crate::engine::model::metrics_types::ExitReason;
use crate::engine::model::position::TrancheId;

/// What a policy wants done in response to the current bar. Zero or more
/// of these are returned from `Policy::on_bar`; `ExitStack` consults its
/// layers in order and stops at the first layer that returns a non-empty
/// action list. Exit actions carry the reason their originating policy
/// fired, so the Replay Engine never has to re-derive it from price alone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Exit the whole remaining position at the given price reference.
    ExitFull(f64, ExitReason),
    /// Exit `frac` of the initial size from tranche `id` at the given
    /// price reference.
    ExitTranche(TrancheId, f64, f64, ExitReason),
    /// No action this bar.
    HoldOn,
    /// Raise (never lower) the armed trailing stop to `new_stop_price`.
    AdjustStop(f64),
}

impl Action {
    pub fn is_exit(&self) -> bool {
        matches!(self, Action::ExitFull(..) | Action::ExitTranche(..))
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        match self {
            Action::ExitFull(_, reason) | Action::ExitTranche(_, _, _, reason) => Some(*reason),
            _ => None,
        }
    }
}
