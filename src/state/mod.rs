//! Double-buffered device state memory.
//!
//! Raw state events and pipeline output are written into the back arena;
//! application code reads the front arena. See [`StateMemory`].

pub mod field;
pub mod memory;

pub use field::{read_word, word_count, write_word, Field, FieldMask, WORD_BITS};
pub use memory::{StateBlock, StateMemory};

use crate::types::DeviceId;
use thiserror::Error;

/// Errors from state arena access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Write of {length} bytes at offset {offset} exceeds {block_length} byte state block")]
    OutOfBounds {
        offset: u32,
        length: usize,
        block_length: u32,
    },

    #[error("No state block allocated for device {0}")]
    UnknownBlock(DeviceId),
}
