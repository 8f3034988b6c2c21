//! Canonical gamepad format (`GPAD`).
//!
//! Every native gamepad format translates into this layout. The shaping
//! fragment registered here runs last for all of them: it exposes the
//! buttons, derives trigger button views, coalesces both triggers into one
//! `trigger` control and applies the radial stick deadzone.

use crate::controls::{ControlLayout, DeviceLayout};
use crate::pipeline::stages::{MaxValue1D, Processor1D, Processor2D, Two1DsTo2D};
use crate::pipeline::{FragmentBuilder, PipelineFragment, PipelineResult, StepFunction1D};
use crate::state::Field;
use crate::types::{FourCC, SourceType};

pub const GAMEPAD_FORMAT: FourCC = FourCC::new(*b"GPAD");

/// Bits of the button word, in bit order.
pub const BUTTONS: [&str; 16] = [
    "buttonSouth",
    "buttonEast",
    "buttonWest",
    "buttonNorth",
    "leftShoulder",
    "rightShoulder",
    "leftStickPress",
    "rightStickPress",
    "start",
    "select",
    "dpadUp",
    "dpadDown",
    "dpadLeft",
    "dpadRight",
    "leftTriggerButton",
    "rightTriggerButton",
];

const AXES: [&str; 7] = [
    "leftTrigger",
    "rightTrigger",
    "leftStickX",
    "leftStickY",
    "rightStickX",
    "rightStickY",
    "trigger",
];

pub fn layout() -> DeviceLayout {
    let mut layout = DeviceLayout::new("Gamepad", GAMEPAD_FORMAT, 32);
    for (bit, name) in BUTTONS.iter().enumerate() {
        layout = layout.with_control(ControlLayout::button(*name, bit as u32 / 8, bit as u32 % 8));
    }
    for (i, name) in AXES.iter().enumerate() {
        layout = layout.with_control(ControlLayout::axis(
            *name,
            Field::bytes(4 + 4 * i as u32, 4),
            SourceType::Float32,
        ));
    }
    layout
}

pub fn fragment() -> PipelineFragment {
    PipelineFragment::new("gamepad", GAMEPAD_FORMAT, None, build)
}

fn build(b: &mut FragmentBuilder<'_>) -> PipelineResult<()> {
    for name in &BUTTONS[..14] {
        if let Some(step) = b.input_1d(name)? {
            b.output(name, step)?;
        }
    }

    let left = trigger(b, "leftTrigger", "leftTriggerButton")?;
    let right = trigger(b, "rightTrigger", "rightTriggerButton")?;
    if let (Some(left), Some(right)) = (left, right) {
        let tolerance = b.settings().merge_tolerance;
        let strongest = b.step_function_1d("trigger")?;
        b.push_stage(MaxValue1D::new(left, right, strongest).with_tolerance(tolerance));
        b.output("trigger", strongest)?;
    }

    stick(b, "leftStick")?;
    stick(b, "rightStick")
}

fn trigger(
    b: &mut FragmentBuilder<'_>,
    axis: &str,
    button: &str,
) -> PipelineResult<Option<StepFunction1D>> {
    let Some(value) = b.input_1d(axis)? else {
        return Ok(None);
    };
    b.output(axis, value)?;

    let press_point = b.settings().trigger_press_point;
    let pressed = b.alongside::<1>(value.x());
    b.push_stage(Processor1D::new(value, pressed).band(press_point, 1.0, 1.0, 0.0));
    b.output(button, pressed)?;
    Ok(Some(value))
}

fn stick(b: &mut FragmentBuilder<'_>, prefix: &str) -> PipelineResult<()> {
    let (x_name, y_name) = (format!("{prefix}X"), format!("{prefix}Y"));
    let (Some(x), Some(y)) = (b.input_1d(&x_name)?, b.input_1d(&y_name)?) else {
        return Ok(());
    };

    let (min, max) = (b.settings().stick_deadzone_min, b.settings().stick_deadzone_max);
    let raw = b.step_function_2d(prefix)?;
    b.push_stage(Two1DsTo2D { x, y, dst: raw });
    let shaped = b.alongside::<2>(raw.x());
    b.push_stage(Processor2D::new(raw, shaped).deadzone(min, max));

    b.output(&x_name, shaped.component(0))?;
    b.output(&y_name, shaped.component(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_valid() {
        let layout = layout();
        layout.validate().unwrap();
        assert_eq!(layout.controls.len(), 23);
        assert_eq!(layout.control("trigger").unwrap().field, Field::bytes(28, 4));
        assert_eq!(layout.control("dpadRight").unwrap().field, Field::bit(1, 5));
    }
}
