//! Device layout descriptors.
//!
//! A [`DeviceLayout`] names a state format and lists the controls found in
//! its state block. Layouts are registered with the fragment registry and
//! looked up by format tag when a pipeline is compiled, and by name when a
//! control path is resolved.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::state::{word_count, Field};
use crate::types::{DestinationType, FourCC, SourceType};
use serde::{Deserialize, Serialize};

/// How a control's value should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ControlKind {
    /// Single bit (or bit group) read as pressed / released
    Button,
    /// Numeric value decoded through the control's source type
    #[default]
    Axis,
    /// Raw integer code
    Integer,
    /// Bytes the pipeline does not interpret
    Opaque,
}

impl ControlKind {
    /// Dataset axis kind the demultiplexer writes for this control.
    pub fn destination_type(self) -> DestinationType {
        match self {
            ControlKind::Button => DestinationType::Bool,
            ControlKind::Integer => DestinationType::UInt,
            ControlKind::Axis | ControlKind::Opaque => DestinationType::Float,
        }
    }

    pub fn is_button(self) -> bool {
        matches!(self, ControlKind::Button)
    }
}

/// One control inside a device's state block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLayout {
    pub name: String,
    pub field: Field,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub kind: ControlKind,
}

impl ControlLayout {
    pub fn button(name: impl Into<String>, byte_offset: u32, bit_offset: u32) -> Self {
        Self {
            name: name.into(),
            field: Field::bit(byte_offset, bit_offset),
            source_type: SourceType::UnsignedBits,
            kind: ControlKind::Button,
        }
    }

    pub fn axis(name: impl Into<String>, field: Field, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            field,
            source_type,
            kind: ControlKind::Axis,
        }
    }

    pub fn integer(name: impl Into<String>, field: Field) -> Self {
        Self {
            name: name.into(),
            field,
            source_type: SourceType::UnsignedBits,
            kind: ControlKind::Integer,
        }
    }

    /// Decode raw field bits into the value seen by bindings.
    pub fn decode(&self, raw: u64) -> f32 {
        match self.kind {
            ControlKind::Button => (raw != 0) as u8 as f32,
            ControlKind::Integer => raw as f32,
            ControlKind::Axis | ControlKind::Opaque => {
                self.source_type.decode(raw, self.field.bit_length)
            }
        }
    }

    /// Encode a pipeline output value into raw field bits.
    pub fn encode(&self, value: f32) -> u64 {
        match self.kind {
            ControlKind::Button => (value >= 0.5) as u64,
            ControlKind::Integer => SourceType::UnsignedBits.encode(value, self.field.bit_length),
            ControlKind::Axis | ControlKind::Opaque => {
                self.source_type.encode(value, self.field.bit_length)
            }
        }
    }
}

/// Memory layout of one state format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceLayout {
    pub name: String,
    pub format: FourCC,
    /// Size of the state block in bytes.
    pub state_size: u32,
    pub controls: Vec<ControlLayout>,
}

impl DeviceLayout {
    pub fn new(name: impl Into<String>, format: FourCC, state_size: u32) -> Self {
        Self {
            name: name.into(),
            format,
            state_size,
            controls: Vec::new(),
        }
    }

    pub fn with_control(mut self, control: ControlLayout) -> Self {
        self.controls.push(control);
        self
    }

    pub fn word_count(&self) -> usize {
        word_count(self.state_size as usize)
    }

    /// Case-insensitive control lookup, returning the control index.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.controls
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn control(&self, name: &str) -> Option<&ControlLayout> {
        self.find(name).map(|i| &self.controls[i])
    }

    /// Check every control fits the state block and its encoding.
    pub fn validate(&self) -> PipelineResult<()> {
        let words = self.word_count();
        for control in &self.controls {
            if !control.source_type.accepts_length(control.field.bit_length) {
                return Err(PipelineError::InvalidField {
                    field: control.field,
                    reason: format!(
                        "control '{}' of {}: {} cannot be {} bits wide",
                        control.name, self.name, control.source_type, control.field.bit_length
                    ),
                });
            }
            if control.field.end_bit() > self.state_size as u64 * 8 {
                return Err(PipelineError::FieldOutOfBounds {
                    field: control.field,
                    word_count: words,
                });
            }
            control.field.mask(words)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad() -> DeviceLayout {
        DeviceLayout::new("TestPad", FourCC::new(*b"TPAD"), 4)
            .with_control(ControlLayout::button("buttonSouth", 0, 0))
            .with_control(ControlLayout::axis(
                "stick",
                Field::bytes(2, 2),
                SourceType::TwosComplementSignedBits,
            ))
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let layout = pad();
        assert_eq!(layout.find("BUTTONSOUTH"), Some(0));
        assert_eq!(layout.find("Stick"), Some(1));
        assert_eq!(layout.find("missing"), None);
    }

    #[test]
    fn test_validate_rejects_field_past_state_size() {
        let layout = pad().with_control(ControlLayout::axis(
            "tooFar",
            Field::bytes(3, 2),
            SourceType::UnsignedBits,
        ));
        assert!(matches!(
            layout.validate(),
            Err(PipelineError::FieldOutOfBounds { .. })
        ));
        assert!(pad().validate().is_ok());
    }

    #[test]
    fn test_button_encode_decode() {
        let button = ControlLayout::button("a", 0, 3);
        assert_eq!(button.encode(1.0), 1);
        assert_eq!(button.encode(0.2), 0);
        assert_eq!(button.decode(1), 1.0);
    }

    #[test]
    fn test_layout_serde() {
        let layout = pad();
        let json = serde_json::to_string(&layout).unwrap();
        let back: DeviceLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layout);
    }
}
