//! Built-in device formats.
//!
//! - [`gamepad`] - canonical `GPAD` layout and its shaping fragment
//! - [`xinput`] - native `XINP` report translated into `GPAD`
//! - [`hid`] - native `HIDP` report with a hat switch translated into `GPAD`

pub mod gamepad;
pub mod hid;
pub mod xinput;

pub use gamepad::GAMEPAD_FORMAT;
pub use hid::HID_FORMAT;
pub use xinput::{XInputReport, XINPUT_FORMAT};

use crate::pipeline::{FragmentRegistry, PipelineResult};

/// Register every built-in layout and fragment.
pub fn register_builtin(registry: &mut FragmentRegistry) -> PipelineResult<()> {
    registry.register_layout(gamepad::layout())?;
    registry.register_layout(xinput::layout())?;
    registry.register_layout(hid::layout())?;
    registry.register_fragment(gamepad::fragment());
    registry.register_fragment(xinput::fragment());
    registry.register_fragment(hid::fragment());
    Ok(())
}

/// Fresh registry holding only the built-in formats.
pub fn builtin_registry() -> PipelineResult<FragmentRegistry> {
    let mut registry = FragmentRegistry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}
