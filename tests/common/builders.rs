//! Test data builders for reports, events and action maps

use input_ingress::actions::{ActionDef, ActionMapDef, BindingDef};
use input_ingress::devices::{XInputReport, HID_FORMAT, XINPUT_FORMAT};
use input_ingress::{DeviceId, InputEvent};

/// Builder for XInput state events
#[derive(Default)]
pub struct XInputEventBuilder {
    report: XInputReport,
}

impl XInputEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buttons(mut self, buttons: u16) -> Self {
        self.report.buttons = buttons;
        self
    }

    pub fn triggers(mut self, left: u8, right: u8) -> Self {
        self.report.left_trigger = left;
        self.report.right_trigger = right;
        self
    }

    pub fn left_stick(mut self, x: i16, y: i16) -> Self {
        self.report.sticks[0] = x;
        self.report.sticks[1] = y;
        self
    }

    pub fn build(self, device: DeviceId, timestamp: u64) -> InputEvent {
        InputEvent::state(device, timestamp, XINPUT_FORMAT, self.report.to_bytes().to_vec())
    }
}

/// Builder for HID gamepad state events
pub struct HidEventBuilder {
    bytes: [u8; 9],
}

impl Default for HidEventBuilder {
    fn default() -> Self {
        // Centered hat and sticks.
        Self {
            bytes: [0, 0, 8, 0x80, 0x80, 0x80, 0x80, 0, 0],
        }
    }
}

impl HidEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buttons(mut self, buttons: u16) -> Self {
        self.bytes[0..2].copy_from_slice(&buttons.to_le_bytes());
        self
    }

    pub fn hat(mut self, hat: u8) -> Self {
        self.bytes[2] = hat & 0x0F;
        self
    }

    pub fn left_stick(mut self, x: u8, y: u8) -> Self {
        self.bytes[3] = x;
        self.bytes[4] = y;
        self
    }

    pub fn triggers(mut self, left: u8, right: u8) -> Self {
        self.bytes[7] = left;
        self.bytes[8] = right;
        self
    }

    pub fn build(self, device: DeviceId, timestamp: u64) -> InputEvent {
        InputEvent::state(device, timestamp, HID_FORMAT, self.bytes.to_vec())
    }
}

/// Builder for action map descriptions
pub struct ActionMapBuilder {
    def: ActionMapDef,
}

impl ActionMapBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            def: ActionMapDef {
                name: name.to_string(),
                actions: Vec::new(),
            },
        }
    }

    /// Add an action with one binding.
    pub fn action(mut self, name: &str, path: &str, interactions: &str) -> Self {
        self.def.actions.push(ActionDef {
            name: name.to_string(),
            bindings: vec![BindingDef {
                path: path.to_string(),
                interactions: interactions.to_string(),
            }],
        });
        self
    }

    /// Add another binding to the most recent action.
    pub fn binding(mut self, path: &str, interactions: &str) -> Self {
        if let Some(action) = self.def.actions.last_mut() {
            action.bindings.push(BindingDef {
                path: path.to_string(),
                interactions: interactions.to_string(),
            });
        }
        self
    }

    pub fn build(self) -> ActionMapDef {
        self.def
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xinput_builder() {
        let event = XInputEventBuilder::new()
            .buttons(0x1000)
            .triggers(255, 0)
            .build(DeviceId(2), 7);
        assert_eq!(event.device_id, DeviceId(2));
        assert_eq!(event.timestamp, 7);
    }
}
