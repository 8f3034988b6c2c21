use super::compiled_plan::{CompiledPipeline, PlanStats};
use super::dataset::DatasetLayout;
use super::error::{PipelineError, PipelineResult};
use super::fragment::{FragmentBuilder, FragmentRegistry, PipelineFragment, PipelineSettings};
use super::id::{StageId, TimeAxisId};
use super::port::{AxisRef, PortDirection};
use super::stage::AnyStage;
use super::stages::Demuxer;
use crate::controls::DeviceLayout;
use crate::types::FourCC;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Compiles fragment chains into execution plans and caches them per
/// (source format, destination format) pair.
#[derive(Debug)]
pub struct PipelineCompiler {
    registry: FragmentRegistry,
    settings: PipelineSettings,
    cache: HashMap<(FourCC, FourCC), Arc<CompiledPipeline>>,
    /// Bumped whenever the registry changes; cached plans are dropped.
    generation: u64,
}

impl PipelineCompiler {
    pub fn new(registry: FragmentRegistry, settings: PipelineSettings) -> Self {
        Self {
            registry,
            settings,
            cache: HashMap::new(),
            generation: 0,
        }
    }

    pub fn registry(&self) -> &FragmentRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of cached plans.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn register_layout(&mut self, layout: DeviceLayout) -> PipelineResult<Arc<DeviceLayout>> {
        let layout = self.registry.register_layout(layout)?;
        self.invalidate();
        Ok(layout)
    }

    pub fn register_fragment(&mut self, fragment: PipelineFragment) {
        self.registry.register_fragment(fragment);
        self.invalidate();
    }

    fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            tracing::debug!("Dropping {} cached pipelines", self.cache.len());
        }
        self.cache.clear();
        self.generation += 1;
    }

    /// Compile (or fetch from the cache) the pipeline translating `source`
    /// state into `destination` state.
    pub fn compile(
        &mut self,
        source: FourCC,
        destination: FourCC,
    ) -> PipelineResult<Arc<CompiledPipeline>> {
        if let Some(plan) = self.cache.get(&(source, destination)) {
            return Ok(Arc::clone(plan));
        }

        let plan = Arc::new(self.build(source, destination)?);
        tracing::info!(
            "Pipeline compiled {} -> {}: {} fields, {} stages, {} outputs in {}us (gen {})",
            source,
            destination,
            plan.stats.demux_fields,
            plan.stats.stages,
            plan.stats.outputs,
            plan.stats.compile_time_us,
            plan.generation,
        );
        self.cache.insert((source, destination), Arc::clone(&plan));
        Ok(plan)
    }

    fn build(&self, source: FourCC, destination: FourCC) -> PipelineResult<CompiledPipeline> {
        let start_time = std::time::Instant::now();

        let source_layout = self
            .registry
            .layout(source)
            .cloned()
            .ok_or(PipelineError::UnknownLayout(source))?;
        let exposed_layout = self
            .registry
            .layout(destination)
            .cloned()
            .ok_or(PipelineError::UnknownLayout(destination))?;
        let chain = self.registry.chain(source, destination)?;

        let mut builder = FragmentBuilder::new(&source_layout, &exposed_layout, &self.settings);
        if chain.is_empty() {
            tracing::debug!(
                "No fragments registered for {}, exposing every control of {}",
                source,
                source_layout.name
            );
            builder.passthrough()?;
        } else {
            for fragment in &chain {
                tracing::trace!("Building fragment '{}'", fragment.name);
                fragment.build(&mut builder)?;
            }
        }

        let FragmentBuilder {
            layout,
            demux,
            stages,
            outputs,
            ..
        } = builder;
        let stages = order_stages(stages, &layout)?;

        let stats = PlanStats {
            fragments: chain.len(),
            demux_fields: demux.len(),
            stages: stages.len(),
            outputs: outputs.len(),
            time_axes: layout.time_axis_count(),
            value_axes: layout.value_axis_count(),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        Ok(CompiledPipeline {
            source,
            destination,
            source_layout,
            exposed_layout,
            dataset_layout: layout,
            demuxer: Demuxer::new(demux),
            stages,
            outputs,
            generation: self.generation,
            stats,
        })
    }
}

fn axis_in_layout(axis: AxisRef, layout: &DatasetLayout) -> bool {
    match axis {
        AxisRef::Time(t) => t.index() < layout.time_axis_count(),
        AxisRef::Value(v) => v.index() < layout.value_axis_count(),
        AxisRef::Int(i) => i.index() < layout.int_axis_count(),
    }
}

fn time_axis_of(axis: AxisRef, layout: &DatasetLayout) -> TimeAxisId {
    match axis {
        AxisRef::Time(t) => t,
        AxisRef::Value(v) => layout.time_axis_of(v),
        AxisRef::Int(i) => layout.time_axis_of_int(i),
    }
}

/// Validate stages and order them so every axis is written before it is
/// read, using Kahn's algorithm. Ties keep declaration order.
pub(crate) fn order_stages(
    stages: Vec<AnyStage>,
    layout: &DatasetLayout,
) -> PipelineResult<Vec<AnyStage>> {
    let n = stages.len();
    let mut ports = Vec::with_capacity(n);

    for (i, stage) in stages.iter().enumerate() {
        let mismatch = |message: String| PipelineError::AxisMismatch {
            stage: StageId::from_index(i),
            name: stage.name().to_string(),
            message,
        };
        let stage_ports = stage.ports(layout);
        if let Some(port) = stage_ports.iter().find(|p| !axis_in_layout(p.axis, layout)) {
            return Err(mismatch(format!("axis {} not in dataset layout", port.axis)));
        }
        stage.validate(layout).map_err(mismatch)?;
        ports.push(stage_ports);
    }

    // Single writer per axis
    let mut writers: HashMap<AxisRef, usize> = HashMap::new();
    for (i, stage_ports) in ports.iter().enumerate() {
        for port in stage_ports.iter().filter(|p| p.direction == PortDirection::Write) {
            match writers.get(&port.axis) {
                Some(&first) if first != i => {
                    return Err(PipelineError::MultipleWriters {
                        axis: port.axis.to_string(),
                        first: StageId::from_index(first),
                        second: StageId::from_index(i),
                    });
                }
                _ => {
                    writers.insert(port.axis, i);
                }
            }
        }
    }

    // Readers follow writers. Anything touching an axis whose timestamp
    // axis another stage resizes follows the resizer.
    let mut successors = vec![BTreeSet::new(); n];
    for (j, stage_ports) in ports.iter().enumerate() {
        for port in stage_ports {
            if port.direction == PortDirection::Read {
                if let Some(&i) = writers.get(&port.axis) {
                    if i != j {
                        successors[i].insert(j);
                    }
                }
            }
            let time = AxisRef::Time(time_axis_of(port.axis, layout));
            if let Some(&i) = writers.get(&time) {
                if i != j {
                    successors[i].insert(j);
                }
            }
        }
    }

    let mut in_degree = vec![0usize; n];
    for next in &successors {
        for &j in next {
            in_degree[j] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &j in &successors[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.insert(j);
            }
        }
    }
    if order.len() != n {
        return Err(PipelineError::CycleDetected);
    }

    let mut slots: Vec<Option<AnyStage>> = stages.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
