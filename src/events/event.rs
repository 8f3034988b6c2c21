//! Binary input events.
//!
//! Wire layout, little-endian:
//!
//! ```text
//! header (20 bytes)  type: FourCC | size: u32 | device: u32 | timestamp: u64
//! STAT payload       format: FourCC | state bytes
//! DLTA payload       format: FourCC | offset: u32 | state bytes
//! DCMD payload       command header | command fields
//! ```
//!
//! `size` counts the header. Buffers hold events back to back.

use super::command::DeviceCommand;
use crate::error::{IngressError, Result};
use crate::types::{DeviceId, FourCC, Timestamp};

pub const EVENT_HEADER_SIZE: usize = 20;

pub const STATE_EVENT: FourCC = FourCC::new(*b"STAT");
pub const DELTA_STATE_EVENT: FourCC = FourCC::new(*b"DLTA");
pub const COMMAND_EVENT: FourCC = FourCC::new(*b"DCMD");

/// A write of (part of) a device's native state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePayload {
    pub format: FourCC,
    /// Byte offset into the state block
    pub offset: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    State(StatePayload),
    Command(DeviceCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub device_id: DeviceId,
    pub timestamp: Timestamp,
    pub body: EventBody,
}

impl InputEvent {
    /// Full-state event.
    pub fn state(
        device_id: DeviceId,
        timestamp: Timestamp,
        format: FourCC,
        bytes: Vec<u8>,
    ) -> Self {
        Self::delta(device_id, timestamp, format, 0, bytes)
    }

    /// Partial-state event starting at `offset`.
    pub fn delta(
        device_id: DeviceId,
        timestamp: Timestamp,
        format: FourCC,
        offset: u32,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            device_id,
            timestamp,
            body: EventBody::State(StatePayload {
                format,
                offset,
                bytes,
            }),
        }
    }

    pub fn command(device_id: DeviceId, timestamp: Timestamp, command: DeviceCommand) -> Self {
        Self {
            device_id,
            timestamp,
            body: EventBody::Command(command),
        }
    }

    pub fn type_tag(&self) -> FourCC {
        match &self.body {
            EventBody::State(s) if s.offset == 0 => STATE_EVENT,
            EventBody::State(_) => DELTA_STATE_EVENT,
            EventBody::Command(_) => COMMAND_EVENT,
        }
    }

    /// Encoded size including the header.
    pub fn size(&self) -> usize {
        EVENT_HEADER_SIZE
            + match &self.body {
                EventBody::State(s) if s.offset == 0 => 4 + s.bytes.len(),
                EventBody::State(s) => 8 + s.bytes.len(),
                EventBody::Command(c) => c.size(),
            }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.size());
        buf.extend_from_slice(&self.type_tag().to_bytes());
        buf.extend_from_slice(&(self.size() as u32).to_le_bytes());
        buf.extend_from_slice(&self.device_id.0.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        match &self.body {
            EventBody::State(s) => {
                buf.extend_from_slice(&s.format.to_bytes());
                if s.offset != 0 {
                    buf.extend_from_slice(&s.offset.to_le_bytes());
                }
                buf.extend_from_slice(&s.bytes);
            }
            EventBody::Command(c) => c.encode(buf),
        }
    }

    /// Decode one event from the front of `bytes`, returning it and the
    /// number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < EVENT_HEADER_SIZE {
            return Err(IngressError::EventDecode(format!(
                "{} bytes is shorter than an event header",
                bytes.len()
            )));
        }
        let type_tag = FourCC(read_u32(bytes, 0));
        let size = read_u32(bytes, 4) as usize;
        let device_id = DeviceId(read_u32(bytes, 8));
        let timestamp = u64::from_le_bytes(array(&bytes[12..20]));
        if size < EVENT_HEADER_SIZE || size > bytes.len() {
            return Err(IngressError::EventDecode(format!(
                "event '{}' declares {} bytes, {} available",
                type_tag,
                size,
                bytes.len()
            )));
        }

        let payload = &bytes[EVENT_HEADER_SIZE..size];
        let short = |needed: usize| {
            IngressError::EventDecode(format!(
                "'{}' payload of {} bytes, needs at least {}",
                type_tag,
                payload.len(),
                needed
            ))
        };
        let body = match type_tag {
            STATE_EVENT => {
                if payload.len() < 4 {
                    return Err(short(4));
                }
                EventBody::State(StatePayload {
                    format: FourCC(read_u32(payload, 0)),
                    offset: 0,
                    bytes: payload[4..].to_vec(),
                })
            }
            DELTA_STATE_EVENT => {
                if payload.len() < 8 {
                    return Err(short(8));
                }
                EventBody::State(StatePayload {
                    format: FourCC(read_u32(payload, 0)),
                    offset: read_u32(payload, 4),
                    bytes: payload[8..].to_vec(),
                })
            }
            COMMAND_EVENT => EventBody::Command(DeviceCommand::decode(payload)?),
            other => {
                return Err(IngressError::EventDecode(format!(
                    "unknown event type '{other}'"
                )))
            }
        };

        Ok((
            Self {
                device_id,
                timestamp,
                body,
            },
            size,
        ))
    }
}

#[inline]
fn array(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    out
}

#[inline]
fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Encode events back to back.
pub fn encode_events<'a>(events: impl IntoIterator<Item = &'a InputEvent>) -> Vec<u8> {
    let mut buf = Vec::new();
    for event in events {
        event.encode(&mut buf);
    }
    buf
}

/// Decode a buffer of back-to-back events.
pub fn decode_events(mut bytes: &[u8]) -> Result<Vec<InputEvent>> {
    let mut events = Vec::new();
    while !bytes.is_empty() {
        let (event, used) = InputEvent::decode(bytes)?;
        events.push(event);
        bytes = &bytes[used..];
    }
    Ok(events)
}
