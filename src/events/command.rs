//! Device commands: requests sent to a device backend, such as rumble.
//!
//! A command is a `{ type, size }` header followed by command-specific
//! fields. Handlers return how many bytes of the command they understood,
//! or a negative value when the command is not supported.

use crate::error::{IngressError, Result};
use crate::types::{DeviceId, FourCC};

pub const COMMAND_HEADER_SIZE: usize = 8;

/// Result code for commands a device does not support.
pub const COMMAND_UNSUPPORTED: i64 = -1;

pub const RUMBLE_COMMAND: FourCC = FourCC::new(*b"RMBL");
pub const IME_CURSOR_COMMAND: FourCC = FourCC::new(*b"IMEP");

/// Raw command buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCommand {
    pub type_tag: FourCC,
    pub payload: Vec<u8>,
}

impl DeviceCommand {
    pub fn new(type_tag: FourCC, payload: Vec<u8>) -> Self {
        Self { type_tag, payload }
    }

    /// Low and high frequency motor speeds in `[0, 1]`.
    pub fn rumble(low_frequency: f32, high_frequency: f32) -> Self {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&low_frequency.to_le_bytes());
        payload.extend_from_slice(&high_frequency.to_le_bytes());
        Self::new(RUMBLE_COMMAND, payload)
    }

    pub fn ime_cursor(x: f32, y: f32) -> Self {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&x.to_le_bytes());
        payload.extend_from_slice(&y.to_le_bytes());
        Self::new(IME_CURSOR_COMMAND, payload)
    }

    /// Total size including the header.
    pub fn size(&self) -> usize {
        COMMAND_HEADER_SIZE + self.payload.len()
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.type_tag.to_bytes());
        buf.extend_from_slice(&(self.size() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < COMMAND_HEADER_SIZE {
            return Err(IngressError::Command(format!(
                "{} bytes is shorter than a command header",
                bytes.len()
            )));
        }
        let type_tag = FourCC(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
        let size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        if size < COMMAND_HEADER_SIZE || size > bytes.len() {
            return Err(IngressError::Command(format!(
                "command '{}' declares {} bytes, {} available",
                type_tag,
                size,
                bytes.len()
            )));
        }
        Ok(Self::new(type_tag, bytes[COMMAND_HEADER_SIZE..size].to_vec()))
    }
}

/// Built-in commands in decoded form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KnownCommand {
    Rumble { low_frequency: f32, high_frequency: f32 },
    ImeCursor { x: f32, y: f32 },
}

impl KnownCommand {
    pub fn parse(command: &DeviceCommand) -> Option<Self> {
        let pair = || -> Option<(f32, f32)> {
            let p = command.payload.get(..8)?;
            Some((
                f32::from_le_bytes([p[0], p[1], p[2], p[3]]),
                f32::from_le_bytes([p[4], p[5], p[6], p[7]]),
            ))
        };
        match command.type_tag {
            RUMBLE_COMMAND => pair().map(|(low_frequency, high_frequency)| KnownCommand::Rumble {
                low_frequency,
                high_frequency,
            }),
            IME_CURSOR_COMMAND => pair().map(|(x, y)| KnownCommand::ImeCursor { x, y }),
            _ => None,
        }
    }
}

/// Backend side of command dispatch.
#[cfg_attr(test, mockall::automock)]
pub trait CommandHandler: Send {
    /// Handle `command` for `device`, possibly writing a reply into its
    /// payload. Returns bytes handled or a negative value if unsupported.
    fn handle(&mut self, device: DeviceId, command: &mut DeviceCommand) -> i64;
}

/// Handler that accepts the built-in commands and logs them.
#[derive(Debug, Default)]
pub struct LoggingCommandHandler {
    handled: usize,
}

impl LoggingCommandHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled(&self) -> usize {
        self.handled
    }
}

impl CommandHandler for LoggingCommandHandler {
    fn handle(&mut self, device: DeviceId, command: &mut DeviceCommand) -> i64 {
        match KnownCommand::parse(command) {
            Some(known) => {
                tracing::info!("Device {} command {:?}", device, known);
                self.handled += 1;
                command.size() as i64
            }
            None => {
                tracing::debug!(
                    "Device {} does not support command '{}'",
                    device,
                    command.type_tag
                );
                COMMAND_UNSUPPORTED
            }
        }
    }
}
