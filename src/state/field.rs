//! Bit-level addressing of control values inside a state block.
//!
//! A [`Field`] names a run of bits. [`FieldMask`] is the precomputed form
//! used on the hot path: one masked read from word A and, only when the
//! field straddles a 64-bit boundary, one masked read from word B.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::types::value_mask;
use serde::{Deserialize, Serialize};

/// Number of bits in one state word.
pub const WORD_BITS: u32 = 64;

/// Sub-region of a state block holding one control value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub byte_offset: u32,
    pub bit_offset: u32,
    pub bit_length: u32,
}

impl Field {
    pub const fn new(byte_offset: u32, bit_offset: u32, bit_length: u32) -> Self {
        Self {
            byte_offset,
            bit_offset,
            bit_length,
        }
    }

    /// Whole-byte field.
    pub const fn bytes(byte_offset: u32, byte_length: u32) -> Self {
        Self::new(byte_offset, 0, byte_length * 8)
    }

    /// Single bit, for buttons.
    pub const fn bit(byte_offset: u32, bit_offset: u32) -> Self {
        Self::new(byte_offset, bit_offset, 1)
    }

    #[inline]
    pub fn first_bit(&self) -> u64 {
        self.byte_offset as u64 * 8 + self.bit_offset as u64
    }

    #[inline]
    pub fn end_bit(&self) -> u64 {
        self.first_bit() + self.bit_length as u64
    }

    /// Compute the mask/shift pairs for a block of `word_count` 64-bit words.
    pub fn mask(&self, word_count: usize) -> PipelineResult<FieldMask> {
        if self.bit_length == 0 || self.bit_length > WORD_BITS {
            return Err(PipelineError::InvalidField {
                field: *self,
                reason: format!("bit length {} outside 1..=64", self.bit_length),
            });
        }
        let last_word = (self.end_bit() - 1) / WORD_BITS as u64;
        if last_word >= word_count as u64 {
            return Err(PipelineError::FieldOutOfBounds {
                field: *self,
                word_count,
            });
        }

        let word = (self.first_bit() / WORD_BITS as u64) as usize;
        let bit = (self.first_bit() % WORD_BITS as u64) as u32;
        let value = value_mask(self.bit_length);

        let mask = if bit == 0 {
            FieldMask {
                word,
                mask_a: value,
                shift_a: 0,
                mask_b: 0,
                shift_b: 0,
                bit_length: self.bit_length,
            }
        } else {
            let mask_b = value >> (WORD_BITS - bit);
            FieldMask {
                word,
                mask_a: value << bit,
                shift_a: bit,
                mask_b,
                shift_b: if mask_b == 0 { 0 } else { WORD_BITS - bit },
                bit_length: self.bit_length,
            }
        };
        Ok(mask)
    }
}

/// Precomputed extraction masks for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldMask {
    /// Index of word A
    pub word: usize,
    pub mask_a: u64,
    pub shift_a: u32,
    /// Zero unless the field straddles into word A + 1
    pub mask_b: u64,
    pub shift_b: u32,
    pub bit_length: u32,
}

impl FieldMask {
    #[inline]
    pub fn straddles(&self) -> bool {
        self.mask_b != 0
    }

    /// Extract from a word slice.
    #[inline]
    pub fn extract_words(&self, words: &[u64]) -> u64 {
        let a = (words[self.word] & self.mask_a) >> self.shift_a;
        if self.straddles() {
            a | ((words[self.word + 1] & self.mask_b) << self.shift_b)
        } else {
            a
        }
    }

    /// Extract from a little-endian byte slice.
    #[inline]
    pub fn extract(&self, bytes: &[u8]) -> u64 {
        let a = (read_word(bytes, self.word) & self.mask_a) >> self.shift_a;
        if self.straddles() {
            a | ((read_word(bytes, self.word + 1) & self.mask_b) << self.shift_b)
        } else {
            a
        }
    }

    /// Whether any bit of the field is set in `changed` (old XOR new).
    #[inline]
    pub fn changed(&self, changed: &[u64]) -> bool {
        let mut bits = changed[self.word] & self.mask_a;
        if self.straddles() {
            bits |= changed[self.word + 1] & self.mask_b;
        }
        bits != 0
    }

    /// Write `value` (low `bit_length` bits) leaving surrounding bits intact.
    pub fn inject(&self, bytes: &mut [u8], value: u64) {
        let value = value & value_mask(self.bit_length);
        let a = read_word(bytes, self.word);
        write_word(
            bytes,
            self.word,
            (a & !self.mask_a) | ((value << self.shift_a) & self.mask_a),
        );
        if self.straddles() {
            let b = read_word(bytes, self.word + 1);
            write_word(
                bytes,
                self.word + 1,
                (b & !self.mask_b) | ((value >> self.shift_b) & self.mask_b),
            );
        }
    }
}

/// Number of 64-bit words needed to cover `byte_length` bytes.
#[inline]
pub fn word_count(byte_length: usize) -> usize {
    byte_length.div_ceil(8)
}

/// Read word `index`, zero-padding a short tail.
#[inline]
pub fn read_word(bytes: &[u8], index: usize) -> u64 {
    let start = index * 8;
    if start + 8 <= bytes.len() {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[start..start + 8]);
        return u64::from_le_bytes(buf);
    }
    let mut buf = [0u8; 8];
    if start < bytes.len() {
        let tail = &bytes[start..];
        buf[..tail.len()].copy_from_slice(tail);
    }
    u64::from_le_bytes(buf)
}

/// Write word `index`, dropping bytes past the end of the slice.
#[inline]
pub fn write_word(bytes: &mut [u8], index: usize, value: u64) {
    let start = index * 8;
    if start >= bytes.len() {
        return;
    }
    let end = (start + 8).min(bytes.len());
    bytes[start..end].copy_from_slice(&value.to_le_bytes()[..end - start]);
}
