//! Stage abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`StagePlugin` trait** - implemented by every stage, and the extension
//!   point for user stages.
//! - **`BuiltinStage` enum** - all built-in stages. The compiler can inline
//!   match arms, eliminating dynamic dispatch overhead on the hot path.
//!
//! `AnyStage` wraps either variant so the pipeline can handle both uniformly.
//!
//! Stages are pure: every bit of continuity (previous values, previous
//! timestamps) lives in the [`Dataset`], so a compiled stage list can be
//! shared between devices and reordered freely by the compiler.

use super::dataset::{Dataset, DatasetLayout};
use super::error::PipelineResult;
use super::port::AxisPort;
use super::stages::{
    Accumulate1D, EnumToFloat, Latest1D, MaxValue1D, MaxValue2D, Processor1D, Processor2D,
    Processor3D, Two1DsTo2D, Vec2ToMagnitude,
};
use std::fmt;

/// Trait implemented by every pipeline stage.
pub trait StagePlugin: Send + Sync {
    /// Human-readable name of this stage.
    fn name(&self) -> &str;

    /// Axes read and written by this stage.
    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort>;

    /// Check axis wiring at compile time. Returns a reason on failure.
    fn validate(&self, _layout: &DatasetLayout) -> Result<(), String> {
        Ok(())
    }

    /// Size destination axes for this tick and return the reserved length.
    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize>;

    /// Write destination values. Always preceded by [`StagePlugin::map`].
    fn execute(&self, dataset: &mut Dataset);
}

/// Enum dispatch for built-in stages.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinStage {
    Latest1D(Latest1D),
    MaxValue1D(MaxValue1D),
    MaxValue2D(MaxValue2D),
    Processor1D(Processor1D),
    Processor2D(Processor2D),
    Processor3D(Processor3D),
    EnumToFloat(EnumToFloat),
    Two1DsTo2D(Two1DsTo2D),
    Vec2ToMagnitude(Vec2ToMagnitude),
    Accumulate1D(Accumulate1D),
}

macro_rules! dispatch {
    ($self:ident, $stage:ident => $body:expr) => {
        match $self {
            BuiltinStage::Latest1D($stage) => $body,
            BuiltinStage::MaxValue1D($stage) => $body,
            BuiltinStage::MaxValue2D($stage) => $body,
            BuiltinStage::Processor1D($stage) => $body,
            BuiltinStage::Processor2D($stage) => $body,
            BuiltinStage::Processor3D($stage) => $body,
            BuiltinStage::EnumToFloat($stage) => $body,
            BuiltinStage::Two1DsTo2D($stage) => $body,
            BuiltinStage::Vec2ToMagnitude($stage) => $body,
            BuiltinStage::Accumulate1D($stage) => $body,
        }
    };
}

impl BuiltinStage {
    pub fn name(&self) -> &str {
        dispatch!(self, s => s.name())
    }

    pub fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        dispatch!(self, s => s.ports(layout))
    }

    pub fn validate(&self, layout: &DatasetLayout) -> Result<(), String> {
        dispatch!(self, s => s.validate(layout))
    }

    #[inline]
    pub fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dispatch!(self, s => s.map(dataset))
    }

    #[inline]
    pub fn execute(&self, dataset: &mut Dataset) {
        dispatch!(self, s => s.execute(dataset))
    }
}

/// Wrapper that holds either a built-in stage (enum dispatch) or a plugin (trait object).
pub enum AnyStage {
    Builtin(BuiltinStage),
    Plugin(Box<dyn StagePlugin>),
}

impl AnyStage {
    pub fn name(&self) -> &str {
        match self {
            AnyStage::Builtin(s) => s.name(),
            AnyStage::Plugin(s) => s.name(),
        }
    }

    pub fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        match self {
            AnyStage::Builtin(s) => s.ports(layout),
            AnyStage::Plugin(s) => s.ports(layout),
        }
    }

    pub fn validate(&self, layout: &DatasetLayout) -> Result<(), String> {
        match self {
            AnyStage::Builtin(s) => s.validate(layout),
            AnyStage::Plugin(s) => s.validate(layout),
        }
    }

    #[inline]
    pub fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        match self {
            AnyStage::Builtin(s) => s.map(dataset),
            AnyStage::Plugin(s) => s.map(dataset),
        }
    }

    #[inline]
    pub fn execute(&self, dataset: &mut Dataset) {
        match self {
            AnyStage::Builtin(s) => s.execute(dataset),
            AnyStage::Plugin(s) => s.execute(dataset),
        }
    }
}

impl fmt::Debug for AnyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyStage::Builtin(s) => f.debug_tuple("Builtin").field(s).finish(),
            AnyStage::Plugin(s) => f.debug_tuple("Plugin").field(&s.name()).finish(),
        }
    }
}

macro_rules! into_any_stage {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for AnyStage {
                fn from(stage: $variant) -> Self {
                    AnyStage::Builtin(BuiltinStage::$variant(stage))
                }
            }
        )*
    };
}

into_any_stage!(
    Latest1D,
    MaxValue1D,
    MaxValue2D,
    Processor1D,
    Processor2D,
    Processor3D,
    EnumToFloat,
    Two1DsTo2D,
    Vec2ToMagnitude,
    Accumulate1D,
);

impl From<Box<dyn StagePlugin>> for AnyStage {
    fn from(plugin: Box<dyn StagePlugin>) -> Self {
        AnyStage::Plugin(plugin)
    }
}
