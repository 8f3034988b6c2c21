//! Generic HID gamepad report (`HIDP`) with a hat switch.
//!
//! ```text
//! offset 0  u16  button bits
//! offset 2  u4   hat switch (0 = north, clockwise to 7; 8..15 = centered)
//! offset 3  u8   sticks, excess-128: left X, left Y, right X, right Y
//! offset 7  u8   left trigger, then right trigger
//! ```
//!
//! HID stick Y grows downwards, so it is flipped on the way in.

use super::gamepad::GAMEPAD_FORMAT;
use crate::controls::{ControlLayout, DeviceLayout};
use crate::pipeline::stages::{EnumToFloat, Processor1D};
use crate::pipeline::{FragmentBuilder, PipelineFragment, PipelineResult};
use crate::state::Field;
use crate::types::{FourCC, SourceType};

pub const HID_FORMAT: FourCC = FourCC::new(*b"HIDP");

pub const REPORT_SIZE: u32 = 9;

const BUTTONS: [&str; 10] = [
    "buttonSouth",
    "buttonEast",
    "buttonWest",
    "buttonNorth",
    "leftShoulder",
    "rightShoulder",
    "select",
    "start",
    "leftStickPress",
    "rightStickPress",
];

/// Hat position lookup per dpad direction, indexed by hat code.
const HAT_TABLES: [(&str, [f32; 8]); 4] = [
    ("dpadUp", [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
    ("dpadRight", [0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
    ("dpadDown", [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0]),
    ("dpadLeft", [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
];

pub fn layout() -> DeviceLayout {
    let mut layout = DeviceLayout::new("HidGamepad", HID_FORMAT, REPORT_SIZE);
    for (bit, name) in BUTTONS.iter().enumerate() {
        layout = layout.with_control(ControlLayout::button(*name, bit as u32 / 8, bit as u32 % 8));
    }
    layout = layout.with_control(ControlLayout::integer("hat", Field::new(2, 0, 4)));
    for (i, name) in ["leftStickX", "leftStickY", "rightStickX", "rightStickY"]
        .iter()
        .enumerate()
    {
        layout = layout.with_control(ControlLayout::axis(
            *name,
            Field::bytes(3 + i as u32, 1),
            SourceType::ExcessKSignedBits,
        ));
    }
    layout
        .with_control(ControlLayout::axis(
            "leftTrigger",
            Field::bytes(7, 1),
            SourceType::UnsignedBits,
        ))
        .with_control(ControlLayout::axis(
            "rightTrigger",
            Field::bytes(8, 1),
            SourceType::UnsignedBits,
        ))
}

pub fn fragment() -> PipelineFragment {
    PipelineFragment::new("hid", HID_FORMAT, Some(GAMEPAD_FORMAT), build)
}

fn build(b: &mut FragmentBuilder<'_>) -> PipelineResult<()> {
    let hat = b.demux_control_int("hat")?;
    for (name, table) in HAT_TABLES {
        let direction = b.step_function_1d(name)?;
        b.push_stage(EnumToFloat::new(hat, direction, 0xF, table.to_vec()));
    }

    for (name, flip) in [
        ("leftStickX", false),
        ("leftStickY", true),
        ("rightStickX", false),
        ("rightStickY", true),
    ] {
        let step = b.demux_control(name)?;
        let (lo, hi) = if flip { (1.0, -1.0) } else { (-1.0, 1.0) };
        // -128 has no positive twin; it clamps to full deflection.
        b.push_stage(Processor1D::new(step, step).remap(-127.0, 127.0, lo, hi).clamped());
        b.name_1d(name, step)?;
    }

    for name in ["leftTrigger", "rightTrigger"] {
        let step = b.demux_control(name)?;
        b.push_stage(Processor1D::new(step, step).remap(0.0, 255.0, 0.0, 1.0));
        b.name_1d(name, step)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_valid() {
        let layout = layout();
        layout.validate().unwrap();
        assert_eq!(layout.control("hat").unwrap().kind, crate::controls::ControlKind::Integer);
    }

    #[test]
    fn test_hat_tables_cover_diagonals() {
        // North-east lights up and right, nothing else.
        let lit: Vec<_> = HAT_TABLES
            .iter()
            .filter(|(_, table)| table[1] == 1.0)
            .map(|(name, _)| *name)
            .collect();
        assert_eq!(lit, ["dpadUp", "dpadRight"]);
    }
}
