//! XInput-style native report (`XINP`).
//!
//! ```text
//! offset 0  u16  button bits
//! offset 2  u8   left trigger
//! offset 3  u8   right trigger
//! offset 4  i16  left stick X, then left Y, right X, right Y
//! ```

use super::gamepad::GAMEPAD_FORMAT;
use crate::controls::{ControlLayout, DeviceLayout};
use crate::pipeline::stages::Processor1D;
use crate::pipeline::{FragmentBuilder, PipelineFragment, PipelineResult};
use crate::state::Field;
use crate::types::{FourCC, SourceType};

pub const XINPUT_FORMAT: FourCC = FourCC::new(*b"XINP");

pub const REPORT_SIZE: u32 = 12;

/// (control, byte, bit) for the button word.
const BUTTONS: [(&str, u32, u32); 14] = [
    ("dpadUp", 0, 0),
    ("dpadDown", 0, 1),
    ("dpadLeft", 0, 2),
    ("dpadRight", 0, 3),
    ("start", 0, 4),
    ("select", 0, 5),
    ("leftStickPress", 0, 6),
    ("rightStickPress", 0, 7),
    ("leftShoulder", 1, 0),
    ("rightShoulder", 1, 1),
    ("buttonSouth", 1, 4),
    ("buttonEast", 1, 5),
    ("buttonWest", 1, 6),
    ("buttonNorth", 1, 7),
];

const STICKS: [&str; 4] = ["leftStickX", "leftStickY", "rightStickX", "rightStickY"];

pub fn layout() -> DeviceLayout {
    let mut layout = DeviceLayout::new("XInputGamepad", XINPUT_FORMAT, REPORT_SIZE);
    for (name, byte, bit) in BUTTONS {
        layout = layout.with_control(ControlLayout::button(name, byte, bit));
    }
    layout = layout
        .with_control(ControlLayout::axis(
            "leftTrigger",
            Field::bytes(2, 1),
            SourceType::UnsignedBits,
        ))
        .with_control(ControlLayout::axis(
            "rightTrigger",
            Field::bytes(3, 1),
            SourceType::UnsignedBits,
        ));
    for (i, name) in STICKS.iter().enumerate() {
        layout = layout.with_control(ControlLayout::axis(
            *name,
            Field::bytes(4 + 2 * i as u32, 2),
            SourceType::TwosComplementSignedBits,
        ));
    }
    layout
}

pub fn fragment() -> PipelineFragment {
    PipelineFragment::new("xinput", XINPUT_FORMAT, Some(GAMEPAD_FORMAT), build)
}

fn build(b: &mut FragmentBuilder<'_>) -> PipelineResult<()> {
    for name in ["leftTrigger", "rightTrigger"] {
        let step = b.demux_control(name)?;
        b.push_stage(Processor1D::new(step, step).remap(0.0, 255.0, 0.0, 1.0));
        b.name_1d(name, step)?;
    }
    for name in STICKS {
        let step = b.demux_control(name)?;
        b.push_stage(
            Processor1D::new(step, step)
                .remap(-32767.0, 32767.0, -1.0, 1.0)
                .clamped(),
        );
        b.name_1d(name, step)?;
    }
    Ok(())
}

/// Encode a report, for tests and replay tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct XInputReport {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub sticks: [i16; 4],
}

impl XInputReport {
    pub fn to_bytes(&self) -> [u8; REPORT_SIZE as usize] {
        let mut bytes = [0u8; REPORT_SIZE as usize];
        bytes[0..2].copy_from_slice(&self.buttons.to_le_bytes());
        bytes[2] = self.left_trigger;
        bytes[3] = self.right_trigger;
        for (i, v) in self.sticks.iter().enumerate() {
            bytes[4 + 2 * i..6 + 2 * i].copy_from_slice(&v.to_le_bytes());
        }
        bytes
    }
}
