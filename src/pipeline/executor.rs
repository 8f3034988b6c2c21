//! Per-device pipeline execution.
//!
//! Each tick, for every device:
//! 1. `begin_tick` rolls the dataset's previous values and empties it.
//! 2. Every applied state event is demultiplexed into the dataset.
//! 3. Stages run in compiled order, `map` then `execute`.
//! 4. The latest sample of every output is written into the exposed block.

use super::compiled_plan::CompiledPipeline;
use super::dataset::Dataset;
use super::error::PipelineResult;
use super::fragment::OutputBinding;
use crate::state::{StateBlock, StateMemory};
use crate::types::Timestamp;
use std::sync::Arc;

/// A compiled plan bound to one device's dataset.
#[derive(Debug)]
pub struct PipelineInstance {
    plan: Arc<CompiledPipeline>,
    dataset: Dataset,
    /// Old XOR new state words of the last applied event
    changed: Vec<u64>,
    seen_state: bool,
}

impl PipelineInstance {
    pub fn new(plan: Arc<CompiledPipeline>, capacity: usize) -> PipelineResult<Self> {
        let dataset = plan.instantiate_dataset(capacity)?;
        let changed = Vec::with_capacity(plan.source_layout.word_count());
        Ok(Self {
            plan,
            dataset,
            changed,
            seen_state: false,
        })
    }

    pub fn plan(&self) -> &Arc<CompiledPipeline> {
        &self.plan
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn begin_tick(&mut self) {
        self.dataset.begin_tick();
    }

    /// Scratch buffer [`StateMemory::apply_state`] fills with changed words.
    pub fn changed_words_mut(&mut self) -> &mut Vec<u64> {
        &mut self.changed
    }

    /// Demultiplex `state` (the source block after an event was applied).
    /// The first state a device ever reports emits every field.
    pub fn demux(&mut self, state: &[u8], timestamp: Timestamp) -> PipelineResult<usize> {
        let all_changed = !self.seen_state;
        self.seen_state = true;
        self.plan
            .demuxer
            .execute(state, &self.changed, all_changed, timestamp, &mut self.dataset)
    }

    /// Run every stage once. Returns the number of stages executed.
    pub fn run(&mut self) -> PipelineResult<usize> {
        for stage in &self.plan.stages {
            stage.map(&mut self.dataset)?;
            stage.execute(&mut self.dataset);
        }
        Ok(self.plan.stages.len())
    }

    /// Samples an output produced this tick.
    pub fn output_samples(&self, output: &OutputBinding) -> (&[Timestamp], &[f32]) {
        (
            self.dataset.timestamps_of(output.axis),
            self.dataset.values(output.axis),
        )
    }

    /// Write the latest sample of every output that changed this tick into
    /// the exposed block. Returns the number of controls written.
    pub fn write_outputs(&self, memory: &mut StateMemory, block: &StateBlock) -> usize {
        let mut written = 0;
        for output in &self.plan.outputs {
            let Some(&value) = self.dataset.values(output.axis).last() else {
                continue;
            };
            let control = &self.plan.exposed_layout.controls[output.control];
            memory.write_field(block, &output.mask, control.encode(value));
            written += 1;
        }
        written
    }

    /// Forget the last reported state; the next event emits every field.
    pub fn reset(&mut self) {
        self.seen_state = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{ControlLayout, DeviceLayout};
    use crate::pipeline::compiler::PipelineCompiler;
    use crate::pipeline::fragment::{FragmentRegistry, PipelineFragment, PipelineSettings};
    use crate::pipeline::stages::Processor1D;
    use crate::state::Field;
    use crate::types::{DeviceId, FourCC, SourceType};

    const RAW: FourCC = FourCC::new(*b"RAW0");
    const CAN: FourCC = FourCC::new(*b"CAN0");

    fn compiler() -> PipelineCompiler {
        let mut registry = FragmentRegistry::new();
        registry
            .register_layout(
                DeviceLayout::new("Raw", RAW, 2)
                    .with_control(ControlLayout::axis(
                        "throttle",
                        Field::bytes(0, 1),
                        SourceType::UnsignedBits,
                    ))
                    .with_control(ControlLayout::button("fire", 1, 0)),
            )
            .unwrap();
        registry
            .register_layout(
                DeviceLayout::new("Canonical", CAN, 8)
                    .with_control(ControlLayout::button("fire", 0, 0))
                    .with_control(ControlLayout::axis(
                        "throttle",
                        Field::bytes(4, 4),
                        SourceType::Float32,
                    )),
            )
            .unwrap();
        registry.register_fragment(PipelineFragment::new("raw", RAW, Some(CAN), |b| {
            let throttle = b.demux_control("throttle")?;
            b.push_stage(Processor1D::new(throttle, throttle).remap(0.0, 255.0, 0.0, 1.0));
            b.name_1d("throttle", throttle)
        }));
        registry.register_fragment(PipelineFragment::new("canonical", CAN, None, |b| {
            for name in ["throttle", "fire"] {
                if let Some(step) = b.input_1d(name)? {
                    b.output(name, step)?;
                }
            }
            Ok(())
        }));
        PipelineCompiler::new(registry, PipelineSettings::default())
    }

    fn setup() -> (PipelineInstance, StateMemory, StateBlock, StateBlock) {
        let plan = compiler().compile(RAW, CAN).unwrap();
        let mut memory = StateMemory::new();
        let raw = memory.allocate(DeviceId(0), RAW, 2);
        let exposed = memory.allocate(DeviceId(0), CAN, 8);
        (PipelineInstance::new(plan, 4).unwrap(), memory, raw, exposed)
    }

    fn apply(
        instance: &mut PipelineInstance,
        memory: &mut StateMemory,
        raw: &StateBlock,
        bytes: &[u8],
        timestamp: Timestamp,
    ) -> usize {
        memory
            .apply_state(raw, 0, bytes, instance.changed_words_mut())
            .unwrap();
        instance.demux(memory.back_block(raw), timestamp).unwrap()
    }

    #[test]
    fn test_tick_writes_exposed_state() {
        let (mut instance, mut memory, raw, exposed) = setup();
        let canonical = Arc::clone(&instance.plan().exposed_layout);
        let fire = canonical.control("fire").unwrap().field.mask(1).unwrap();
        let throttle = canonical.control("throttle").unwrap().field.mask(1).unwrap();

        instance.begin_tick();
        assert_eq!(apply(&mut instance, &mut memory, &raw, &[255, 1], 100), 2);
        assert_eq!(instance.run().unwrap(), 1);
        assert_eq!(instance.write_outputs(&mut memory, &exposed), 2);
        memory.swap();

        assert_eq!(memory.read_field(&exposed, &fire), 1);
        let value = SourceType::Float32.decode(memory.read_field(&exposed, &throttle), 32);
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_unchanged_fields_are_not_resampled() {
        let (mut instance, mut memory, raw, exposed) = setup();

        instance.begin_tick();
        apply(&mut instance, &mut memory, &raw, &[0, 1], 100);
        instance.run().unwrap();
        instance.write_outputs(&mut memory, &exposed);
        memory.swap();

        instance.begin_tick();
        // Only the throttle byte moves.
        assert_eq!(apply(&mut instance, &mut memory, &raw, &[51, 1], 200), 1);
        instance.run().unwrap();
        assert_eq!(instance.write_outputs(&mut memory, &exposed), 1);

        let plan = Arc::clone(instance.plan());
        let throttle = plan.output_for(plan.exposed_layout.find("throttle").unwrap()).unwrap();
        let (timestamps, values) = instance.output_samples(throttle);
        assert_eq!(timestamps, &[200]);
        assert!((values[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_idle_tick_writes_nothing() {
        let (mut instance, mut memory, raw, exposed) = setup();
        instance.begin_tick();
        apply(&mut instance, &mut memory, &raw, &[10, 0], 1);
        instance.run().unwrap();
        memory.swap();

        instance.begin_tick();
        instance.run().unwrap();
        assert_eq!(instance.write_outputs(&mut memory, &exposed), 0);
    }
}
