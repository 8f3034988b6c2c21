//! Action phases and the transitions allowed between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of an action.
///
/// `Performed` and `Canceled` are reported as events; the action itself is
/// back in `Waiting` once they have been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Disabled,
    Waiting,
    Started,
    Performed,
    Canceled,
}

impl Phase {
    /// Whether an action in `self` may move to `next`.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (_, Disabled) => true,
            (Disabled, Waiting) => true,
            (Performed | Canceled, Waiting) => true,
            (Waiting, Started) => true,
            (Waiting | Started, Performed) => true,
            (Started, Canceled) => true,
            _ => false,
        }
    }

    /// `Performed` or `Canceled`: the phases that close a `Started`.
    pub fn is_completion(self) -> bool {
        matches!(self, Phase::Performed | Phase::Canceled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Disabled => "Disabled",
            Phase::Waiting => "Waiting",
            Phase::Started => "Started",
            Phase::Performed => "Performed",
            Phase::Canceled => "Canceled",
        };
        f.write_str(name)
    }
}
