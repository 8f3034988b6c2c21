use super::dataset::{Dataset, DatasetLayout};
use super::error::PipelineResult;
use super::fragment::OutputBinding;
use super::stage::AnyStage;
use super::stages::Demuxer;
use crate::controls::DeviceLayout;
use crate::types::FourCC;
use std::sync::Arc;

/// Compiled, immutable pipeline for one (source format, destination format)
/// pair. Shared by every device of that pairing; per-device continuity lives
/// in the [`Dataset`] each device instantiates from it.
#[derive(Debug)]
pub struct CompiledPipeline {
    pub source: FourCC,
    pub destination: FourCC,

    /// Layout of the raw state events
    pub source_layout: Arc<DeviceLayout>,

    /// Layout the outputs are written into and controls resolve against
    pub exposed_layout: Arc<DeviceLayout>,

    pub dataset_layout: DatasetLayout,

    pub demuxer: Demuxer,

    /// Stages in execution order
    pub stages: Vec<AnyStage>,

    pub outputs: Vec<OutputBinding>,

    /// Compiler generation this plan was built in
    pub generation: u64,

    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Fragments concatenated into this plan
    pub fragments: usize,

    /// Demultiplexed fields
    pub demux_fields: usize,

    /// Stages in the execution order
    pub stages: usize,

    /// Output bindings
    pub outputs: usize,

    pub time_axes: usize,
    pub value_axes: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl CompiledPipeline {
    /// Fresh per-device storage.
    pub fn instantiate_dataset(&self, capacity: usize) -> PipelineResult<Dataset> {
        Dataset::from_layout(&self.dataset_layout, capacity)
    }

    /// Output feeding exposed control `control`, if any.
    pub fn output_for(&self, control: usize) -> Option<&OutputBinding> {
        self.outputs.iter().find(|o| o.control == control)
    }

    /// Check if the plan has any work to do
    pub fn is_empty(&self) -> bool {
        self.demuxer.is_empty() && self.stages.is_empty()
    }
}
