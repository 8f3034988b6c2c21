//! Mock helpers for command handling tests

use input_ingress::events::{CommandHandler, DeviceCommand, KnownCommand, COMMAND_UNSUPPORTED};
use input_ingress::DeviceId;
use std::sync::{Arc, Mutex};

/// Handler recording every command it receives; supports rumble only
#[derive(Clone, Default)]
pub struct RecordingHandler {
    pub received: Arc<Mutex<Vec<(DeviceId, KnownCommand)>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<(DeviceId, KnownCommand)> {
        self.received.lock().unwrap().clone()
    }
}

impl CommandHandler for RecordingHandler {
    fn handle(&mut self, device: DeviceId, command: &mut DeviceCommand) -> i64 {
        match KnownCommand::parse(command) {
            Some(known @ KnownCommand::Rumble { .. }) => {
                self.received.lock().unwrap().push((device, known));
                command.size() as i64
            }
            _ => COMMAND_UNSUPPORTED,
        }
    }
}
