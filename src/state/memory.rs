//! Front/back state buffers shared by every device.
//!
//! Each device owns one [`StateBlock`] inside a pair of byte arenas. Event
//! application and pipeline output write into the back arena; readers only
//! ever see the front arena. [`StateMemory::swap`] flips the index flag at the
//! tick boundary and then copies the ranges written this tick into the new
//! back arena, so both arenas agree outside the ranges touched by the next
//! tick.

use super::field::{read_word, word_count, FieldMask};
use super::StateError;
use crate::types::{DeviceId, FourCC};
use std::ops::Range;

/// Alignment of every block inside the arenas.
const BLOCK_ALIGNMENT: u32 = 8;

/// Where a device's raw state lives in the arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateBlock {
    pub device_id: DeviceId,
    pub byte_offset: u32,
    /// Declared length; the arenas reserve this rounded up to 8 bytes.
    pub byte_length: u32,
    pub format: FourCC,
}

impl StateBlock {
    #[inline]
    pub fn padded_length(&self) -> u32 {
        self.byte_length.div_ceil(BLOCK_ALIGNMENT) * BLOCK_ALIGNMENT
    }

    #[inline]
    pub fn word_count(&self) -> usize {
        word_count(self.byte_length as usize)
    }

    #[inline]
    fn range(&self) -> Range<usize> {
        let start = self.byte_offset as usize;
        start..start + self.padded_length() as usize
    }
}

/// Owner of the two state arenas.
#[derive(Debug, Default)]
pub struct StateMemory {
    buffers: [Vec<u8>; 2],
    front: usize,
    /// Allocated blocks ordered by offset
    blocks: Vec<StateBlock>,
    /// Byte ranges written into the back arena since the last swap
    dirty: Vec<Range<usize>>,
    swaps: u64,
}

impl StateMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total arena size in bytes (per buffer).
    pub fn size(&self) -> usize {
        self.buffers[0].len()
    }

    /// Number of completed swaps.
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    pub fn blocks(&self) -> &[StateBlock] {
        &self.blocks
    }

    /// Reserve a zeroed block for `device`. Freed ranges are reused first-fit.
    pub fn allocate(
        &mut self,
        device_id: DeviceId,
        format: FourCC,
        byte_length: u32,
    ) -> StateBlock {
        let mut block = StateBlock {
            device_id,
            byte_offset: 0,
            byte_length,
            format,
        };
        let needed = block.padded_length() as usize;

        let mut cursor = 0usize;
        let mut insert_at = self.blocks.len();
        for (i, existing) in self.blocks.iter().enumerate() {
            if existing.byte_offset as usize - cursor >= needed {
                insert_at = i;
                break;
            }
            cursor = existing.range().end;
        }

        block.byte_offset = cursor as u32;
        let end = cursor + needed;
        if end > self.size() {
            for buffer in &mut self.buffers {
                buffer.resize(end, 0);
            }
        }
        self.blocks.insert(insert_at, block);
        tracing::debug!(
            "Allocated {} byte state block for {} at offset {}",
            byte_length,
            device_id,
            block.byte_offset
        );
        block
    }

    /// Release a block. Both arenas are zeroed over its range.
    pub fn free(&mut self, block: &StateBlock) -> Result<(), StateError> {
        let index = self
            .blocks
            .iter()
            .position(|b| b == block)
            .ok_or(StateError::UnknownBlock(block.device_id))?;
        self.blocks.remove(index);
        let range = block.range();
        for buffer in &mut self.buffers {
            buffer[range.clone()].fill(0);
        }
        self.dirty.retain(|r| r.end <= range.start || r.start >= range.end);
        Ok(())
    }

    /// The readable arena.
    #[inline]
    pub fn front(&self) -> &[u8] {
        &self.buffers[self.front]
    }

    /// Readable bytes of `block` (padded length).
    #[inline]
    pub fn front_block(&self, block: &StateBlock) -> &[u8] {
        &self.buffers[self.front][block.range()]
    }

    /// Bytes of `block` as written so far this tick.
    #[inline]
    pub fn back_block(&self, block: &StateBlock) -> &[u8] {
        &self.buffers[1 - self.front][block.range()]
    }

    /// Read a field from the front arena.
    #[inline]
    pub fn read_field(&self, block: &StateBlock, mask: &FieldMask) -> u64 {
        mask.extract(self.front_block(block))
    }

    /// Read a field from the back arena.
    #[inline]
    pub fn read_back_field(&self, block: &StateBlock, mask: &FieldMask) -> u64 {
        mask.extract(self.back_block(block))
    }

    /// Write a field into the back arena.
    pub fn write_field(&mut self, block: &StateBlock, mask: &FieldMask, raw: u64) {
        let range = block.range();
        let back = 1 - self.front;
        mask.inject(&mut self.buffers[back][range.clone()], raw);

        let start = range.start + mask.word * 8;
        let words = if mask.straddles() { 2 } else { 1 };
        let end = (start + words * 8).min(range.end);
        self.mark_dirty(start..end);
    }

    /// Copy `bytes` into the back arena at `offset` within `block`, recording
    /// old XOR new for every word of the block into `changed`.
    pub fn apply_state(
        &mut self,
        block: &StateBlock,
        offset: u32,
        bytes: &[u8],
        changed: &mut Vec<u64>,
    ) -> Result<(), StateError> {
        let end = offset as usize + bytes.len();
        if end > block.byte_length as usize {
            return Err(StateError::OutOfBounds {
                offset,
                length: bytes.len(),
                block_length: block.byte_length,
            });
        }

        let words = block.word_count();
        let range = block.range();
        let back = &mut self.buffers[1 - self.front][range.clone()];

        changed.clear();
        changed.extend((0..words).map(|i| read_word(back, i)));
        back[offset as usize..end].copy_from_slice(bytes);
        for (i, word) in changed.iter_mut().enumerate() {
            *word ^= read_word(back, i);
        }

        let start = range.start + offset as usize;
        self.mark_dirty(start..start + bytes.len());
        Ok(())
    }

    /// Publish the back arena. Ranges written this tick are copied into the
    /// new back arena so the pair is identical again.
    pub fn swap(&mut self) {
        self.front = 1 - self.front;
        let (first, second) = self.buffers.split_at_mut(1);
        let (src, dst) = if self.front == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        };
        for range in self.dirty.drain(..) {
            dst[range.clone()].copy_from_slice(&src[range]);
        }
        self.swaps += 1;
    }

    fn mark_dirty(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        if let Some(last) = self.dirty.last_mut() {
            if range.start <= last.end && range.end >= last.start {
                last.start = last.start.min(range.start);
                last.end = last.end.max(range.end);
                return;
            }
        }
        self.dirty.push(range);
    }
}
