//! Device layouts and control resolution.
//!
//! A control is addressed by a path such as `<Gamepad>/leftStick/x`. Paths
//! are parsed and resolved once at bind time into a [`ResolvedControl`]
//! holding the state block and field mask; nothing is re-parsed per tick.

pub mod layout;
pub mod path;
pub mod resolver;

pub use layout::{ControlKind, ControlLayout, DeviceLayout};
pub use path::ControlPath;
pub use resolver::{ControlResolver, DeviceView, ResolvedControl};
