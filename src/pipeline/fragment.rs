//! Pipeline fragments and the registry the compiler draws them from.
//!
//! A fragment is a closure that appends demux entries, step functions,
//! stages and output bindings to a [`FragmentBuilder`]. Fragments are keyed
//! by format tag: compiling `(src, dst)` runs the fragments that translate
//! `src` into `dst`, then the fragments that shape `dst` itself. Fragments
//! hand step functions to each other by name.

use super::dataset::{DatasetLayout, StepFunction, StepFunction1D, StepFunction2D, StepFunctionInt};
use super::error::{PipelineError, PipelineResult};
use super::id::ValueAxisId;
use super::stage::AnyStage;
use super::stages::{DemuxField, DEFAULT_MERGE_TOLERANCE};
use crate::controls::{ControlLayout, DeviceLayout};
use crate::state::FieldMask;
use crate::types::{DestinationType, FourCC};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Tunables handed to every fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub merge_tolerance: f32,
    pub stick_deadzone_min: f32,
    pub stick_deadzone_max: f32,
    /// Analog value at which trigger button views read pressed.
    pub trigger_press_point: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            merge_tolerance: DEFAULT_MERGE_TOLERANCE,
            stick_deadzone_min: 0.125,
            stick_deadzone_max: 0.925,
            trigger_press_point: 0.5,
        }
    }
}

/// A step function written into an exposed control each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputBinding {
    /// Index into the exposed layout's controls
    pub control: usize,
    pub mask: FieldMask,
    pub axis: ValueAxisId,
}

#[derive(Debug, Clone, Copy)]
enum Named {
    Value1(StepFunction1D),
    Value2(StepFunction2D),
    Int(StepFunctionInt),
}

/// Accumulates the pieces of one compiled pipeline.
pub struct FragmentBuilder<'a> {
    source: &'a DeviceLayout,
    exposed: &'a DeviceLayout,
    settings: &'a PipelineSettings,
    pub(crate) layout: DatasetLayout,
    pub(crate) demux: Vec<DemuxField>,
    pub(crate) stages: Vec<AnyStage>,
    pub(crate) outputs: Vec<OutputBinding>,
    names: HashMap<String, Named>,
}

impl<'a> FragmentBuilder<'a> {
    pub fn new(
        source: &'a DeviceLayout,
        exposed: &'a DeviceLayout,
        settings: &'a PipelineSettings,
    ) -> Self {
        Self {
            source,
            exposed,
            settings,
            layout: DatasetLayout::new(),
            demux: Vec::new(),
            stages: Vec::new(),
            outputs: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn source_layout(&self) -> &DeviceLayout {
        self.source
    }

    pub fn exposed_layout(&self) -> &DeviceLayout {
        self.exposed
    }

    pub fn settings(&self) -> &PipelineSettings {
        self.settings
    }

    pub fn dataset_layout(&self) -> &DatasetLayout {
        &self.layout
    }

    fn source_control(&self, name: &str) -> PipelineResult<&'a ControlLayout> {
        let source = self.source;
        source
            .control(name)
            .ok_or_else(|| PipelineError::UnknownControl {
                layout: source.name.clone(),
                control: name.to_string(),
            })
    }

    fn demux_entry(
        &mut self,
        control: &ControlLayout,
        destination: DestinationType,
        index: usize,
    ) -> PipelineResult<()> {
        let field = DemuxField::new(
            &control.field,
            self.source.word_count(),
            control.source_type,
            destination,
            index,
        )?;
        self.demux.push(field);
        Ok(())
    }

    /// Demux a source control into a fresh float step function.
    pub fn demux_control(&mut self, name: &str) -> PipelineResult<StepFunction1D> {
        let control = self.source_control(name)?;
        let step = self.layout.add_step_function::<1>();
        let destination = match control.kind.destination_type() {
            DestinationType::UInt => DestinationType::Float,
            other => other,
        };
        self.demux_entry(control, destination, step.x().index())?;
        Ok(step)
    }

    /// Demux a source control into a fresh integer step function.
    pub fn demux_control_int(&mut self, name: &str) -> PipelineResult<StepFunctionInt> {
        let control = self.source_control(name)?;
        let step = self.layout.add_int_step_function();
        self.demux_entry(control, DestinationType::UInt, step.axis.index())?;
        Ok(step)
    }

    fn register(&mut self, name: &str, named: Named) -> PipelineResult<()> {
        if self.names.contains_key(name) {
            return Err(PipelineError::DuplicateStepFunction(name.to_string()));
        }
        self.names.insert(name.to_string(), named);
        Ok(())
    }

    /// Publish an existing step function under `name` for later fragments.
    pub fn name_1d(&mut self, name: &str, step: StepFunction1D) -> PipelineResult<()> {
        self.register(name, Named::Value1(step))
    }

    pub fn name_2d(&mut self, name: &str, step: StepFunction2D) -> PipelineResult<()> {
        self.register(name, Named::Value2(step))
    }

    pub fn name_int(&mut self, name: &str, step: StepFunctionInt) -> PipelineResult<()> {
        self.register(name, Named::Int(step))
    }

    /// New 1D step function on its own timestamp axis.
    pub fn step_function_1d(&mut self, name: &str) -> PipelineResult<StepFunction1D> {
        let step = self.layout.add_step_function::<1>();
        self.name_1d(name, step)?;
        Ok(step)
    }

    pub fn step_function_2d(&mut self, name: &str) -> PipelineResult<StepFunction2D> {
        let step = self.layout.add_step_function::<2>();
        self.name_2d(name, step)?;
        Ok(step)
    }

    /// Unnamed step function sharing the timestamp axis of `of`, for stages
    /// that map sample-per-sample.
    pub fn alongside<const N: usize>(&mut self, of: ValueAxisId) -> StepFunction<N> {
        let time = self.layout.time_axis_of(of);
        self.layout.add_step_function_on::<N>(time)
    }

    pub fn lookup_1d(&self, name: &str) -> PipelineResult<StepFunction1D> {
        match self.names.get(name) {
            Some(Named::Value1(step)) => Ok(*step),
            _ => Err(PipelineError::UnknownStepFunction(name.to_string())),
        }
    }

    pub fn lookup_2d(&self, name: &str) -> PipelineResult<StepFunction2D> {
        match self.names.get(name) {
            Some(Named::Value2(step)) => Ok(*step),
            _ => Err(PipelineError::UnknownStepFunction(name.to_string())),
        }
    }

    pub fn lookup_int(&self, name: &str) -> PipelineResult<StepFunctionInt> {
        match self.names.get(name) {
            Some(Named::Int(step)) => Ok(*step),
            _ => Err(PipelineError::UnknownStepFunction(name.to_string())),
        }
    }

    /// Named step function if an earlier fragment published one, otherwise
    /// the source control of the same name demuxed directly. `None` when
    /// neither exists.
    pub fn input_1d(&mut self, name: &str) -> PipelineResult<Option<StepFunction1D>> {
        if let Some(Named::Value1(step)) = self.names.get(name) {
            return Ok(Some(*step));
        }
        if self.source.find(name).is_none() {
            return Ok(None);
        }
        let step = self.demux_control(name)?;
        self.name_1d(name, step)?;
        Ok(Some(step))
    }

    pub fn push_stage(&mut self, stage: impl Into<AnyStage>) {
        self.stages.push(stage.into());
    }

    /// Write the latest sample of `step` into an exposed control every tick.
    pub fn output(&mut self, control: &str, step: StepFunction1D) -> PipelineResult<()> {
        let exposed = self.exposed;
        let index = exposed
            .find(control)
            .ok_or_else(|| PipelineError::UnknownOutputControl {
                layout: exposed.name.clone(),
                control: control.to_string(),
            })?;
        let mask = exposed.controls[index].field.mask(exposed.word_count())?;
        self.outputs.push(OutputBinding {
            control: index,
            mask,
            axis: step.x(),
        });
        Ok(())
    }

    /// Demux every control of the source layout and write it straight back
    /// out under the same name.
    pub fn passthrough(&mut self) -> PipelineResult<()> {
        let source = self.source;
        for control in &source.controls {
            let Some(step) = self.input_1d(&control.name)? else {
                continue;
            };
            if self.exposed.find(&control.name).is_some() {
                self.output(&control.name, step)?;
            }
        }
        Ok(())
    }
}

pub type FragmentFn = dyn Fn(&mut FragmentBuilder<'_>) -> PipelineResult<()> + Send + Sync;

/// One registered contribution to a compiled pipeline.
#[derive(Clone)]
pub struct PipelineFragment {
    pub name: String,
    /// Format this fragment reads.
    pub format: FourCC,
    /// Format this fragment translates into; `None` when it shapes `format`
    /// itself.
    pub target: Option<FourCC>,
    build: Arc<FragmentFn>,
}

impl PipelineFragment {
    pub fn new<F>(name: impl Into<String>, format: FourCC, target: Option<FourCC>, build: F) -> Self
    where
        F: Fn(&mut FragmentBuilder<'_>) -> PipelineResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            format,
            target,
            build: Arc::new(build),
        }
    }

    pub fn build(&self, builder: &mut FragmentBuilder<'_>) -> PipelineResult<()> {
        (self.build)(builder)
    }
}

impl fmt::Debug for PipelineFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineFragment")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("target", &self.target)
            .finish()
    }
}

/// Layouts and fragments by format tag.
#[derive(Debug, Clone, Default)]
pub struct FragmentRegistry {
    layouts: HashMap<FourCC, Arc<DeviceLayout>>,
    fragments: HashMap<FourCC, Vec<PipelineFragment>>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a layout after validating its fields.
    pub fn register_layout(&mut self, layout: DeviceLayout) -> PipelineResult<Arc<DeviceLayout>> {
        layout.validate()?;
        let layout = Arc::new(layout);
        self.layouts.insert(layout.format, Arc::clone(&layout));
        Ok(layout)
    }

    pub fn register_fragment(&mut self, fragment: PipelineFragment) {
        self.fragments
            .entry(fragment.format)
            .or_default()
            .push(fragment);
    }

    pub fn layout(&self, format: FourCC) -> Option<&Arc<DeviceLayout>> {
        self.layouts.get(&format)
    }

    /// Case-insensitive lookup by layout name.
    pub fn layout_by_name(&self, name: &str) -> Option<&Arc<DeviceLayout>> {
        self.layouts
            .values()
            .find(|l| l.name.eq_ignore_ascii_case(name))
    }

    pub fn layouts(&self) -> impl Iterator<Item = &Arc<DeviceLayout>> {
        self.layouts.values()
    }

    pub fn fragments(&self, format: FourCC) -> &[PipelineFragment] {
        self.fragments.get(&format).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Format a device of format `source` is exposed as: the target of its
    /// first translating fragment, or the source format itself.
    pub fn destination_for(&self, source: FourCC) -> FourCC {
        self.fragments(source)
            .iter()
            .find_map(|f| f.target)
            .unwrap_or(source)
    }

    /// Fragments to run for `(source, destination)`, in order. Empty when
    /// neither format has any.
    pub fn chain(
        &self,
        source: FourCC,
        destination: FourCC,
    ) -> PipelineResult<Vec<&PipelineFragment>> {
        let mut chain: Vec<&PipelineFragment> = Vec::new();
        if source != destination {
            chain.extend(
                self.fragments(source)
                    .iter()
                    .filter(|f| f.target == Some(destination)),
            );
            if chain.is_empty() {
                return Err(PipelineError::UnknownFormat(source));
            }
        }
        chain.extend(self.fragments(destination).iter().filter(|f| f.target.is_none()));
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::ControlLayout;
    use crate::state::Field;
    use crate::types::SourceType;

    const RAW: FourCC = FourCC::new(*b"RAW0");
    const CAN: FourCC = FourCC::new(*b"CAN0");

    fn raw_layout() -> DeviceLayout {
        DeviceLayout::new("Raw", RAW, 4)
            .with_control(ControlLayout::button("fire", 0, 0))
            .with_control(ControlLayout::axis(
                "throttle",
                Field::bytes(1, 1),
                SourceType::UnsignedBits,
            ))
    }

    fn canonical_layout() -> DeviceLayout {
        DeviceLayout::new("Canonical", CAN, 8)
            .with_control(ControlLayout::button("fire", 0, 0))
            .with_control(ControlLayout::axis("throttle", Field::bytes(4, 4), SourceType::Float32))
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (raw, settings) = (raw_layout(), PipelineSettings::default());
        let mut builder = FragmentBuilder::new(&raw, &raw, &settings);
        builder.step_function_1d("x").unwrap();
        assert_eq!(
            builder.step_function_1d("x").unwrap_err(),
            PipelineError::DuplicateStepFunction("x".to_string())
        );
    }

    #[test]
    fn test_input_falls_back_to_demux() {
        let (raw, settings) = (raw_layout(), PipelineSettings::default());
        let mut builder = FragmentBuilder::new(&raw, &raw, &settings);
        let step = builder.input_1d("throttle").unwrap().unwrap();
        assert_eq!(builder.demux.len(), 1);
        // Second lookup hits the published name instead of demuxing again.
        assert_eq!(builder.input_1d("throttle").unwrap(), Some(step));
        assert_eq!(builder.demux.len(), 1);
        assert_eq!(builder.input_1d("missing").unwrap(), None);
    }

    #[test]
    fn test_unknown_output_control() {
        let (raw, settings) = (raw_layout(), PipelineSettings::default());
        let mut builder = FragmentBuilder::new(&raw, &raw, &settings);
        let step = builder.step_function_1d("x").unwrap();
        assert!(matches!(
            builder.output("nope", step),
            Err(PipelineError::UnknownOutputControl { .. })
        ));
    }

    #[test]
    fn test_chain_orders_translation_before_shaping() {
        let mut registry = FragmentRegistry::new();
        registry.register_layout(raw_layout()).unwrap();
        registry.register_layout(canonical_layout()).unwrap();
        registry.register_fragment(PipelineFragment::new("shape", CAN, None, |_| Ok(())));
        registry.register_fragment(PipelineFragment::new("translate", RAW, Some(CAN), |_| Ok(())));

        assert_eq!(registry.destination_for(RAW), CAN);
        let names: Vec<_> = registry
            .chain(RAW, CAN)
            .unwrap()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, ["translate", "shape"]);
    }

    #[test]
    fn test_chain_without_translation_is_unknown_format() {
        let mut registry = FragmentRegistry::new();
        registry.register_fragment(PipelineFragment::new("shape", CAN, None, |_| Ok(())));
        assert_eq!(
            registry.chain(RAW, CAN).unwrap_err(),
            PipelineError::UnknownFormat(RAW)
        );
        assert_eq!(registry.destination_for(RAW), RAW);
    }
}
