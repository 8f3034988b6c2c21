//! Actions and interactions.
//!
//! An [`Action`] owns bindings; each [`Binding`] resolves a control path
//! and runs its interactions over every sample of the bound controls. The
//! phase machine accepts only the transitions in [`Phase::can_transition_to`]
//! and guarantees that every `Started` is closed by exactly one `Performed`
//! or `Canceled`, including when a map is disabled or rebound mid-action.
//!
//! # Main Types
//!
//! - [`ActionMap`] - Group of actions enabled together, with subscribers
//! - [`Interaction`] - Press, Hold, Tap, SlowTap or a custom kind
//! - [`InteractionRegistry`] - Name lookup and `name(key=value)` parsing
//! - [`ActionEvent`] - Phase change delivered to subscribers

pub mod action;
pub mod interaction;
pub mod map;
pub mod phase;
pub mod registry;

pub use action::{Action, ActionEvent, Binding, ControlSample};
pub use interaction::{
    CustomInteraction, Hold, Interaction, InteractionContext, InteractionSettings, PhaseRequest,
    Press, SlowTap, Tap,
};
pub use map::{ActionDef, ActionMap, ActionMapDef, BindingDef, Subscriber};
pub use phase::Phase;
pub use registry::{InteractionParams, InteractionRegistry};
