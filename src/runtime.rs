//! The input runtime: devices, the event queue, pipelines and action maps
//! driven by one [`InputRuntime::update`] call per tick.
//!
//! Each device owns two state blocks. Native reports land in the source
//! block; the device's compiled pipeline turns them into the exposed block
//! in the canonical format. Readers only ever see the front buffer, which
//! changes at the swap that ends a tick.

use crate::actions::{ActionEvent, ActionMap, ActionMapDef, ControlSample, InteractionRegistry};
use crate::config::IngressConfig;
use crate::controls::{ControlPath, ControlResolver, DeviceLayout, DeviceView};
use crate::devices::builtin_registry;
use crate::error::{IngressError, Result, ResultExt};
use crate::events::{
    event_channel, CommandHandler, DeviceCommand, EventBody, EventQueue, EventSender, InputEvent,
    COMMAND_UNSUPPORTED,
};
use crate::pipeline::{FragmentRegistry, PipelineCompiler, PipelineInstance};
use crate::state::{StateBlock, StateMemory};
use crate::types::{DeviceId, TickStats, Timestamp};
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Result of one tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub stats: TickStats,
    /// Phase events in emission order, including those caused by device
    /// or map changes since the previous tick
    pub events: Vec<ActionEvent>,
}

struct DeviceEntry {
    source: StateBlock,
    exposed: StateBlock,
    pipeline: PipelineInstance,
    handler: Option<Box<dyn CommandHandler>>,
}

impl DeviceEntry {
    fn view(&self, id: DeviceId) -> DeviceView {
        DeviceView {
            id,
            block: self.exposed,
            layout: Arc::clone(&self.pipeline.plan().exposed_layout),
        }
    }
}

pub struct InputRuntime {
    config: IngressConfig,
    compiler: PipelineCompiler,
    interactions: InteractionRegistry,
    memory: StateMemory,
    devices: BTreeMap<DeviceId, DeviceEntry>,
    next_device: u32,
    queue: EventQueue,
    sender: EventSender,
    receiver: Receiver<InputEvent>,
    maps: Vec<ActionMap>,
    tick: u64,
    /// Latest event time seen, used to stamp phase events from device or
    /// map changes
    now: Timestamp,
    /// Phase events raised between ticks
    pending: Vec<ActionEvent>,
    samples: Vec<ControlSample>,
}

impl InputRuntime {
    /// Runtime with the built-in device formats.
    pub fn new(config: IngressConfig) -> Result<Self> {
        let registry = builtin_registry()?;
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: IngressConfig, registry: FragmentRegistry) -> Result<Self> {
        config.validate()?;
        let compiler = PipelineCompiler::new(registry, config.pipeline.settings());
        let interactions = InteractionRegistry::new(config.interaction);
        let (sender, receiver) = event_channel(config.queue.channel_capacity);
        Ok(Self {
            config,
            compiler,
            interactions,
            memory: StateMemory::new(),
            devices: BTreeMap::new(),
            next_device: 0,
            queue: EventQueue::new(),
            sender,
            receiver,
            maps: Vec::new(),
            tick: 0,
            now: 0,
            pending: Vec::new(),
            samples: Vec::new(),
        })
    }

    pub fn config(&self) -> &IngressConfig {
        &self.config
    }

    pub fn compiler(&self) -> &PipelineCompiler {
        &self.compiler
    }

    /// Register layouts and fragments before adding devices that use them.
    pub fn compiler_mut(&mut self) -> &mut PipelineCompiler {
        &mut self.compiler
    }

    pub fn interactions(&self) -> &InteractionRegistry {
        &self.interactions
    }

    pub fn interactions_mut(&mut self) -> &mut InteractionRegistry {
        &mut self.interactions
    }

    pub fn memory(&self) -> &StateMemory {
        &self.memory
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    // ==================== Devices ====================

    /// Add a device reporting state in `layout`'s format. Unknown layouts
    /// are registered first. Fails if the layout is invalid or its pipeline
    /// cannot be compiled; nothing is allocated in that case.
    pub fn add_device(&mut self, layout: DeviceLayout) -> Result<DeviceId> {
        let format = layout.format;
        let known = self.compiler.registry().layout(format).map(|l| l.as_ref() == &layout);
        if known != Some(true) {
            self.compiler
                .register_layout(layout)
                .with_context(|| format!("registering layout for {format}"))?;
        }
        let destination = self.compiler.registry().destination_for(format);
        let plan = self
            .compiler
            .compile(format, destination)
            .with_context(|| format!("compiling pipeline {format} -> {destination}"))?;
        let pipeline = PipelineInstance::new(
            Arc::clone(&plan),
            self.config.pipeline.initial_dataset_capacity,
        )?;

        let id = DeviceId(self.next_device);
        self.next_device += 1;
        let source = self
            .memory
            .allocate(id, format, plan.source_layout.state_size);
        let exposed = self
            .memory
            .allocate(id, destination, plan.exposed_layout.state_size);
        self.devices.insert(
            id,
            DeviceEntry {
                source,
                exposed,
                pipeline,
                handler: None,
            },
        );
        tracing::info!(
            "Added device {} ({} exposed as {})",
            id,
            plan.source_layout.name,
            plan.exposed_layout.name
        );
        self.rebind_maps();
        Ok(id)
    }

    /// Add a device together with the backend handling its commands.
    pub fn add_device_with_handler(
        &mut self,
        layout: DeviceLayout,
        handler: Box<dyn CommandHandler>,
    ) -> Result<DeviceId> {
        let id = self.add_device(layout)?;
        self.set_command_handler(id, handler)?;
        Ok(id)
    }

    pub fn set_command_handler(
        &mut self,
        id: DeviceId,
        handler: Box<dyn CommandHandler>,
    ) -> Result<()> {
        let device = self
            .devices
            .get_mut(&id)
            .ok_or(IngressError::UnknownDevice(id))?;
        device.handler = Some(handler);
        Ok(())
    }

    /// Remove a device. Its queued events are discarded and actions it was
    /// driving are canceled.
    pub fn remove_device(&mut self, id: DeviceId) -> Result<()> {
        let device = self
            .devices
            .remove(&id)
            .ok_or(IngressError::UnknownDevice(id))?;
        self.memory.free(&device.source)?;
        self.memory.free(&device.exposed)?;
        let discarded = self.queue.remove_device(id);
        tracing::info!("Removed device {} ({} queued events discarded)", id, discarded);
        self.rebind_maps();
        Ok(())
    }

    pub fn device_ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.keys().copied()
    }

    /// Exposed block and layout of every device, in id order.
    pub fn device_views(&self) -> Vec<DeviceView> {
        self.devices
            .iter()
            .map(|(id, device)| device.view(*id))
            .collect()
    }

    pub fn exposed_layout(&self, id: DeviceId) -> Option<&Arc<DeviceLayout>> {
        self.devices
            .get(&id)
            .map(|d| &d.pipeline.plan().exposed_layout)
    }

    /// Current (front buffer) value of a control of one device.
    pub fn read_control(&self, id: DeviceId, path: &str) -> Result<f32> {
        let device = self.devices.get(&id).ok_or(IngressError::UnknownDevice(id))?;
        let path = ControlPath::parse(path)?;
        let view = device.view(id);
        let control = ControlResolver::resolve(&path, [&view])?
            .into_iter()
            .next()
            .ok_or_else(|| IngressError::Binding {
                path: path.to_string(),
                message: format!("no such control on device {id}"),
            })?;
        Ok(control.read(&self.memory))
    }

    // ==================== Events and commands ====================

    /// Queue an event for the next tick.
    pub fn queue_event(&mut self, event: InputEvent) {
        tracing::trace!(
            "Queued '{}' for {} at {}",
            event.type_tag(),
            event.device_id,
            event.timestamp
        );
        self.queue.push(event);
    }

    /// Handle for queueing events from other threads.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    pub fn queued_events(&self) -> usize {
        self.queue.len() + self.receiver.len()
    }

    /// Send a command to a device's backend immediately. Returns the bytes
    /// handled, negative when unsupported.
    pub fn send_command(&mut self, id: DeviceId, command: &mut DeviceCommand) -> Result<i64> {
        let device = self
            .devices
            .get_mut(&id)
            .ok_or(IngressError::UnknownDevice(id))?;
        Ok(dispatch(id, device, command))
    }

    // ==================== Action maps ====================

    /// Add a map. Bindings that do not fit any exposed layout are dropped
    /// from it and returned as errors; the rest of the map is kept.
    pub fn add_action_map(&mut self, mut map: ActionMap) -> Result<Vec<IngressError>> {
        if self.maps.iter().any(|m| m.name() == map.name()) {
            return Err(IngressError::Config(format!(
                "action map '{}' already exists",
                map.name()
            )));
        }
        let layouts = self.exposed_layouts();
        let refs: Vec<&DeviceLayout> = layouts.iter().map(|l| l.as_ref()).collect();
        let rejected = map.validate(&refs);
        tracing::info!(
            "Added action map '{}' ({} actions, {} bindings rejected)",
            map.name(),
            map.actions().len(),
            rejected.len()
        );
        self.maps.push(map);
        Ok(rejected)
    }

    /// Build a map from its description with this runtime's interactions.
    pub fn load_action_map(&mut self, def: &ActionMapDef) -> Result<Vec<IngressError>> {
        let map = def.build(&self.interactions)?;
        self.add_action_map(map)
    }

    pub fn action_map(&self, name: &str) -> Option<&ActionMap> {
        self.maps.iter().find(|m| m.name() == name)
    }

    pub fn action_map_mut(&mut self, name: &str) -> Option<&mut ActionMap> {
        self.maps.iter_mut().find(|m| m.name() == name)
    }

    pub fn enable_action_map(&mut self, name: &str) -> Result<()> {
        let views = self.device_views();
        let map = self
            .maps
            .iter_mut()
            .find(|m| m.name() == name)
            .ok_or_else(|| IngressError::UnknownActionMap(name.to_string()))?;
        map.enable(&views, &self.memory);
        Ok(())
    }

    pub fn disable_action_map(&mut self, name: &str) -> Result<()> {
        let map = self
            .maps
            .iter_mut()
            .find(|m| m.name() == name)
            .ok_or_else(|| IngressError::UnknownActionMap(name.to_string()))?;
        map.disable(self.now, &mut self.pending);
        Ok(())
    }

    fn exposed_layouts(&self) -> Vec<Arc<DeviceLayout>> {
        let registry = self.compiler.registry();
        let mut layouts: Vec<Arc<DeviceLayout>> = Vec::new();
        for layout in registry.layouts() {
            let exposed = registry
                .layout(registry.destination_for(layout.format))
                .unwrap_or(layout);
            if !layouts.iter().any(|l| l.format == exposed.format) {
                layouts.push(Arc::clone(exposed));
            }
        }
        layouts
    }

    fn rebind_maps(&mut self) {
        let views = self.device_views();
        for map in &mut self.maps {
            map.rebind(&views, &self.memory, self.now, &mut self.pending);
        }
    }

    // ==================== Tick ====================

    /// Run one tick: apply queued events oldest first, run every device
    /// pipeline, publish the new state and feed the action maps.
    pub fn update(&mut self) -> Result<TickReport> {
        self.tick += 1;
        let mut stats = TickStats {
            tick: self.tick,
            ..Default::default()
        };

        for event in self.receiver.try_iter() {
            self.queue.push(event);
        }
        for device in self.devices.values_mut() {
            device.pipeline.begin_tick();
        }

        let batch = self.queue.take_batch(self.config.queue.max_events_per_tick);
        for event in batch {
            self.now = self.now.max(event.timestamp);
            let Some(device) = self.devices.get_mut(&event.device_id) else {
                tracing::warn!("Dropping event for unknown device {}", event.device_id);
                stats.events_dropped += 1;
                continue;
            };
            match event.body {
                EventBody::State(state) => {
                    if state.format != device.source.format {
                        tracing::warn!(
                            "Dropping '{}' state for {}, expected '{}'",
                            state.format,
                            event.device_id,
                            device.source.format
                        );
                        stats.events_dropped += 1;
                        continue;
                    }
                    if let Err(e) = self.memory.apply_state(
                        &device.source,
                        state.offset,
                        &state.bytes,
                        device.pipeline.changed_words_mut(),
                    ) {
                        tracing::warn!("Dropping state event for {}: {}", event.device_id, e);
                        stats.events_dropped += 1;
                        continue;
                    }
                    stats.samples_demuxed += device
                        .pipeline
                        .demux(self.memory.back_block(&device.source), event.timestamp)
                        .with_context(|| format!("demultiplexing state of {}", event.device_id))?;
                    stats.events_processed += 1;
                }
                EventBody::Command(mut command) => {
                    let handled = dispatch(event.device_id, device, &mut command);
                    tracing::trace!(
                        "Command '{}' for {} returned {}",
                        command.type_tag,
                        event.device_id,
                        handled
                    );
                    stats.commands_dispatched += 1;
                    stats.events_processed += 1;
                }
            }
        }

        self.samples.clear();
        for (id, device) in &mut self.devices {
            stats.stages_executed += device
                .pipeline
                .run()
                .with_context(|| format!("running pipeline of {id}"))?;
            device.pipeline.write_outputs(&mut self.memory, &device.exposed);
            for output in &device.pipeline.plan().outputs {
                let (times, values) = device.pipeline.output_samples(output);
                self.samples
                    .extend(times.iter().zip(values).map(|(&time, &value)| ControlSample {
                        device: *id,
                        control: output.control,
                        time,
                        value,
                    }));
            }
        }
        // Stable: equal times keep device then output order.
        self.samples.sort_by_key(|s| s.time);
        self.memory.swap();

        let mut events = std::mem::take(&mut self.pending);
        for sample in &self.samples {
            for map in &mut self.maps {
                map.process(sample, &mut events);
            }
        }
        stats.action_events = events.len();

        tracing::debug!(
            "Tick {}: {} events ({} dropped), {} samples, {} stages, {} action events",
            stats.tick,
            stats.events_processed,
            stats.events_dropped,
            stats.samples_demuxed,
            stats.stages_executed,
            stats.action_events
        );
        Ok(TickReport { stats, events })
    }
}

fn dispatch(id: DeviceId, device: &mut DeviceEntry, command: &mut DeviceCommand) -> i64 {
    match device.handler.as_mut() {
        Some(handler) => handler.handle(id, command),
        None => {
            tracing::debug!("{} has no command handler for '{}'", id, command.type_tag);
            COMMAND_UNSUPPORTED
        }
    }
}

impl fmt::Debug for InputRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRuntime")
            .field("devices", &self.devices.len())
            .field("queued", &self.queue.len())
            .field("maps", &self.maps.len())
            .field("tick", &self.tick)
            .finish()
    }
}
