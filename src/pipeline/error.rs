//! Pipeline-specific error types.

use crate::pipeline::id::{StageId, TimeAxisId};
use crate::state::Field;
use crate::types::FourCC;
use thiserror::Error;

/// Errors that can occur while compiling or executing a pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Field {field:?} is invalid: {reason}")]
    InvalidField { field: Field, reason: String },

    #[error("Field {field:?} exceeds {word_count} word state block")]
    FieldOutOfBounds { field: Field, word_count: usize },

    #[error("No pipeline fragment registered for format '{0}'")]
    UnknownFormat(FourCC),

    #[error("No layout registered for format '{0}'")]
    UnknownLayout(FourCC),

    #[error("Unknown control '{control}' in layout '{layout}'")]
    UnknownControl { layout: String, control: String },

    #[error("Unknown step function '{0}'")]
    UnknownStepFunction(String),

    #[error("Step function '{0}' declared twice")]
    DuplicateStepFunction(String),

    #[error("Output control '{control}' not present in layout '{layout}'")]
    UnknownOutputControl { layout: String, control: String },

    #[error("Stage {stage} ({name}): {message}")]
    AxisMismatch {
        stage: StageId,
        name: String,
        message: String,
    },

    #[error("Axis {axis} written by stages {first} and {second}")]
    MultipleWriters {
        axis: String,
        first: StageId,
        second: StageId,
    },

    #[error("Cycle detected in pipeline graph")]
    CycleDetected,

    #[error("Dataset growth to {requested} samples on {axis} failed")]
    DatasetGrowth { axis: TimeAxisId, requested: usize },
}

impl PipelineError {
    /// Everything except allocation failure is a compile-time configuration
    /// problem.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, PipelineError::DatasetGrowth { .. })
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
