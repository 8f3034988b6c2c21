//! Built-in pipeline stages.

pub mod conversion;
pub mod demux;
pub mod merger;
pub mod processor;

pub use conversion::{Accumulate1D, EnumToFloat, Two1DsTo2D, Vec2ToMagnitude};
pub use demux::{DemuxField, Demuxer};
pub use merger::{Latest1D, MaxValue1D, MaxValue2D, DEFAULT_MERGE_TOLERANCE};
pub use processor::{Processor1D, Processor2D, Processor3D, VectorProcessor};
