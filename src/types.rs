//! Core data types for input-ingress
//!
//! This module contains the small value types shared by every layer:
//! format tags, device ids, timestamps and the bit encodings a control
//! value may use inside a device's state memory.
//!
//! # Main Types
//!
//! - [`FourCC`] - Four character code naming a state, event or command format
//! - [`DeviceId`] - Stable id handed out by the runtime on `add_device`
//! - [`SourceType`] - How the raw bits of a field encode a number
//! - [`DestinationType`] - Which dataset axis kind a demuxed field lands in
//! - [`TickStats`] - Counters for a single update tick
//!
//! # Time
//!
//! Timestamps are `u64` nanoseconds. Interaction durations are configured in
//! seconds and converted with [`seconds_to_ticks`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Number of timestamp ticks in one second.
pub const TICKS_PER_SECOND: u64 = 1_000_000_000;

/// Timestamp in nanoseconds.
pub type Timestamp = u64;

/// Convert seconds to timestamp ticks, saturating at zero for negative input.
#[inline]
pub fn seconds_to_ticks(seconds: f64) -> Timestamp {
    if seconds <= 0.0 || !seconds.is_finite() {
        return 0;
    }
    (seconds * TICKS_PER_SECOND as f64).round() as Timestamp
}

/// Convert timestamp ticks to seconds.
#[inline]
pub fn ticks_to_seconds(ticks: Timestamp) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// Four character code, stored little-endian so that the first character is
/// the lowest byte on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FourCC(pub u32);

impl FourCC {
    pub const fn new(code: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(code))
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Parse a four character ASCII string.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return None;
        }
        Some(Self::new([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC('{}')", self)
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FourCC {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FourCC::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid four character code '{s}'")))
    }
}

/// Stable device identifier handed out by the runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub const INVALID: DeviceId = DeviceId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "DeviceId(INVALID)")
        } else {
            write!(f, "DeviceId({})", self.0)
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bit encoding of a raw field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SourceType {
    #[default]
    UnsignedBits,
    TwosComplementSignedBits,
    /// Offset binary: stored value minus `2^(bits-1)`.
    ExcessKSignedBits,
    /// IEEE-754 single precision, requires a 32 bit field.
    Float32,
}

impl SourceType {
    /// Decode `raw` (already shifted down and masked to `bit_length` bits).
    pub fn decode(self, raw: u64, bit_length: u32) -> f32 {
        match self {
            SourceType::UnsignedBits => raw as f32,
            SourceType::TwosComplementSignedBits => sign_extend(raw, bit_length) as f32,
            SourceType::ExcessKSignedBits => {
                let bias = 1i128 << (bit_length.clamp(1, 64) - 1);
                (raw as i128 - bias) as f32
            }
            SourceType::Float32 => f32::from_bits(raw as u32),
        }
    }

    /// Encode `value` into the low `bit_length` bits of the result.
    pub fn encode(self, value: f32, bit_length: u32) -> u64 {
        let mask = value_mask(bit_length);
        let raw = match self {
            // `as` from float saturates and maps NaN to zero.
            SourceType::UnsignedBits => value.round().max(0.0) as u64,
            SourceType::TwosComplementSignedBits => value.round() as i64 as u64,
            SourceType::ExcessKSignedBits => {
                let bias = 1i128 << (bit_length.clamp(1, 64) - 1);
                (value.round() as i128 + bias) as u64
            }
            SourceType::Float32 => value.to_bits() as u64,
        };
        raw & mask
    }

    /// Whether a field of `bit_length` bits can hold this encoding.
    pub fn accepts_length(self, bit_length: u32) -> bool {
        match self {
            SourceType::Float32 => bit_length == 32,
            _ => (1..=64).contains(&bit_length),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::UnsignedBits => write!(f, "uint"),
            SourceType::TwosComplementSignedBits => write!(f, "int"),
            SourceType::ExcessKSignedBits => write!(f, "excess-k"),
            SourceType::Float32 => write!(f, "float"),
        }
    }
}

/// Kind of dataset axis a demuxed field is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DestinationType {
    #[default]
    Float,
    /// Raw integer code, for enum lookups further down the pipeline.
    UInt,
    /// 1.0 when any bit of the field is set, else 0.0.
    Bool,
}

/// Mask covering the low `bit_length` bits.
#[inline]
pub fn value_mask(bit_length: u32) -> u64 {
    match bit_length {
        0 => 0,
        n if n >= 64 => u64::MAX,
        n => u64::MAX >> (64 - n),
    }
}

#[inline]
fn sign_extend(raw: u64, bit_length: u32) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return raw as i64;
    }
    let shift = 64 - bit_length;
    ((raw << shift) as i64) >> shift
}

/// Counters collected over one update tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    /// Monotonic tick counter
    pub tick: u64,
    /// Events popped and applied this tick
    pub events_processed: usize,
    /// Events dropped (unknown device, format mismatch, oversized payload)
    pub events_dropped: usize,
    /// Command events dispatched to device handlers
    pub commands_dispatched: usize,
    /// Samples written into datasets by the demultiplexer
    pub samples_demuxed: usize,
    /// Stage executions across all device pipelines
    pub stages_executed: usize,
    /// Action phase events emitted
    pub action_events: usize,
}
