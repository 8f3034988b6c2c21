//! Step-function dataflow pipeline.
//!
//! Raw device state is demultiplexed into per-control step functions, shaped
//! by stages and written into the exposed (canonical) state block.
//!
//! # Architecture
//!
//! ```text
//! [state event] ──► Demuxer ──► Dataset ──► stages (topological order)
//!                                              │
//!                                              └──► outputs ──► exposed block
//! ```
//!
//! # Design
//!
//! - **Enum dispatch on hot path**: `BuiltinStage` enum for all built-in stages.
//! - **Stateless stages**: previous values and timestamps live in the `Dataset`.
//! - **Buffer reuse**: datasets keep capacity across ticks; growth is fallible.
//! - **Compiled once**: plans are cached per (source, destination) format pair.

pub mod compiled_plan;
pub mod compiler;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod fragment;
pub mod id;
pub mod port;
pub mod stage;
pub mod stages;

pub use compiled_plan::{CompiledPipeline, PlanStats};
pub use compiler::PipelineCompiler;
pub use dataset::{
    Columns, Dataset, DatasetLayout, StepFunction, StepFunction1D, StepFunction2D, StepFunction3D,
    StepFunctionInt,
};
pub use error::{PipelineError, PipelineResult};
pub use executor::PipelineInstance;
pub use fragment::{
    FragmentBuilder, FragmentRegistry, OutputBinding, PipelineFragment, PipelineSettings,
};
pub use id::{IntAxisId, StageId, TimeAxisId, ValueAxisId};
pub use port::{AxisPort, AxisRef, PortDirection, PortList};
pub use stage::{AnyStage, BuiltinStage, StagePlugin};
