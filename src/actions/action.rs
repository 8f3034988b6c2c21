//! Actions, their bindings and the phase state machine that drives them.

use super::interaction::{Interaction, InteractionContext, PhaseRequest};
use super::phase::Phase;
use crate::controls::{ControlKind, ControlPath, ResolvedControl};
use crate::error::{IngressError, Result};
use crate::types::{ticks_to_seconds, DeviceId, Timestamp};
use serde::Serialize;

/// A phase change reported to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEvent {
    pub action: String,
    pub phase: Phase,
    pub time: Timestamp,
    /// Path of the control that caused the change
    pub control: String,
    /// Interaction that requested the change, `None` for default behavior
    pub interaction: Option<String>,
    /// Time the action started, or `time` for a direct perform
    pub start_time: Timestamp,
    /// Seconds between `start_time` and `time`
    pub duration: f64,
}

/// One value of one exposed control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSample {
    pub device: DeviceId,
    /// Index into the device's exposed layout
    pub control: usize,
    pub time: Timestamp,
    pub value: f32,
}

#[derive(Debug)]
struct InteractionSlot {
    interaction: Interaction,
    phase: Phase,
}

/// Request coming out of a binding, tagged with the interaction behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BindingRequest {
    phase: Phase,
    interaction: Option<usize>,
}

/// A control path plus the interactions watching it.
#[derive(Debug)]
pub struct Binding {
    path: ControlPath,
    slots: Vec<InteractionSlot>,
    controls: Vec<ResolvedControl>,
    /// Interaction currently driving the action
    driver: Option<usize>,
    /// Default behavior: control left its rest value and Started was sent
    actuated: bool,
    /// Control was away from rest when bound; ignored until it returns
    suppressed: bool,
    /// Control whose actuation owns the interaction state. Other controls
    /// of the binding are ignored until it returns to rest.
    active: Option<(DeviceId, usize)>,
}

fn at_rest(value: f32) -> bool {
    value == 0.0 || value.is_nan()
}

impl Binding {
    pub fn new(path: ControlPath, interactions: Vec<Interaction>) -> Self {
        Self {
            path,
            slots: interactions
                .into_iter()
                .map(|interaction| InteractionSlot {
                    interaction,
                    phase: Phase::Waiting,
                })
                .collect(),
            controls: Vec::new(),
            driver: None,
            actuated: false,
            suppressed: false,
            active: None,
        }
    }

    pub fn path(&self) -> &ControlPath {
        &self.path
    }

    pub fn controls(&self) -> &[ResolvedControl] {
        &self.controls
    }

    pub fn interactions(&self) -> impl Iterator<Item = &Interaction> {
        self.slots.iter().map(|s| &s.interaction)
    }

    pub fn has_interactions(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Whether `sample` belongs to one of the bound controls.
    pub fn watches(&self, sample: &ControlSample) -> bool {
        self.controls
            .iter()
            .any(|c| c.device == sample.device && c.control == sample.control)
    }

    /// Every interaction must be able to drive a control of `kind`.
    pub fn check_kind(&self, kind: ControlKind, control: &str) -> Result<()> {
        match self.slots.iter().find(|s| !s.interaction.accepts(kind)) {
            Some(slot) => Err(IngressError::Binding {
                path: self.path.to_string(),
                message: format!(
                    "interaction '{}' cannot drive {:?} control {}",
                    slot.interaction.name(),
                    kind,
                    control
                ),
            }),
            None => Ok(()),
        }
    }

    /// Replace the bound controls. `initial` holds their current values.
    pub(crate) fn bind(&mut self, controls: Vec<ResolvedControl>, initial: &[f32]) {
        self.reset();
        self.suppressed = initial.iter().any(|v| !at_rest(*v));
        self.controls = controls;
    }

    pub(crate) fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.interaction.reset();
            slot.phase = Phase::Waiting;
        }
        self.driver = None;
        self.actuated = false;
        self.suppressed = false;
        self.active = None;
    }

    /// Drop in-flight state after another binding claimed the action. A
    /// control still away from rest must return to it before counting again.
    fn yield_to_driver(&mut self, sample: &ControlSample) {
        self.reset();
        self.suppressed = !at_rest(sample.value);
        self.active = self.suppressed.then_some((sample.device, sample.control));
    }

    fn process(&mut self, sample: &ControlSample, out: &mut Vec<BindingRequest>) {
        let key = (sample.device, sample.control);
        if self.active.is_some_and(|active| active != key) {
            return;
        }
        self.active = (!at_rest(sample.value)).then_some(key);

        if self.suppressed {
            self.suppressed = !at_rest(sample.value);
            return;
        }
        if self.slots.is_empty() {
            self.process_default(sample.value, out);
        } else {
            self.process_interactions(sample.time, sample.value, out);
        }
    }

    fn process_interactions(&mut self, time: Timestamp, value: f32, out: &mut Vec<BindingRequest>) {

        for i in 0..self.slots.len() {
            let ctx = InteractionContext {
                phase: self.slots[i].phase,
                ..InteractionContext::new(time, value)
            };
            match self.slots[i].interaction.process(&ctx) {
                PhaseRequest::None => {}
                PhaseRequest::Started => {
                    if self.slots[i].phase == Phase::Started {
                        continue;
                    }
                    self.slots[i].phase = Phase::Started;
                    if self.driver.is_none() {
                        self.driver = Some(i);
                        out.push(BindingRequest {
                            phase: Phase::Started,
                            interaction: Some(i),
                        });
                    }
                }
                PhaseRequest::Performed => {
                    out.push(BindingRequest {
                        phase: Phase::Performed,
                        interaction: Some(i),
                    });
                    // A perform completes the binding; the rest start over.
                    for (j, slot) in self.slots.iter_mut().enumerate() {
                        if j != i {
                            slot.interaction.reset();
                        }
                        slot.phase = Phase::Waiting;
                    }
                    self.driver = None;
                    return;
                }
                PhaseRequest::Canceled => {
                    self.slots[i].phase = Phase::Waiting;
                    if self.driver != Some(i) {
                        continue;
                    }
                    out.push(BindingRequest {
                        phase: Phase::Canceled,
                        interaction: Some(i),
                    });
                    self.driver = self.slots.iter().position(|s| s.phase == Phase::Started);
                    if let Some(next) = self.driver {
                        out.push(BindingRequest {
                            phase: Phase::Started,
                            interaction: Some(next),
                        });
                    }
                }
            }
        }
    }

    fn process_default(&mut self, value: f32, out: &mut Vec<BindingRequest>) {
        let at_rest = at_rest(value);
        if !self.actuated && !at_rest {
            self.actuated = true;
            out.push(BindingRequest {
                phase: Phase::Started,
                interaction: None,
            });
        } else if self.actuated && at_rest {
            self.actuated = false;
            out.push(BindingRequest {
                phase: Phase::Performed,
                interaction: None,
            });
        }
    }
}

/// A named action and its bindings, processed in declaration order.
#[derive(Debug)]
pub struct Action {
    name: String,
    bindings: Vec<Binding>,
    phase: Phase,
    /// Binding whose Started is in flight
    driving: Option<usize>,
    start_time: Timestamp,
    start_control: String,
    start_interaction: Option<String>,
    scratch: Vec<BindingRequest>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
            phase: Phase::Disabled,
            driving: None,
            start_time: 0,
            start_control: String::new(),
            start_interaction: None,
            scratch: Vec::new(),
        }
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn add_binding(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    pub(crate) fn remove_binding(&mut self, index: usize) -> Binding {
        self.bindings.remove(index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub(crate) fn bindings_mut(&mut self) -> &mut [Binding] {
        &mut self.bindings
    }

    pub(crate) fn enable(&mut self) {
        if self.phase == Phase::Disabled {
            self.phase = Phase::Waiting;
        }
    }

    /// Cancel an in-flight Started, then reset every binding.
    pub(crate) fn interrupt(&mut self, time: Timestamp, out: &mut Vec<ActionEvent>) {
        if self.phase == Phase::Started {
            let control = self.start_control.clone();
            let interaction = self.start_interaction.clone();
            self.emit(Phase::Canceled, time, control, interaction, out);
        }
        for binding in &mut self.bindings {
            binding.reset();
        }
    }

    pub(crate) fn disable(&mut self, time: Timestamp, out: &mut Vec<ActionEvent>) {
        self.interrupt(time, out);
        self.phase = Phase::Disabled;
    }

    /// Feed one sample to the binding at `index`.
    pub(crate) fn process(
        &mut self,
        index: usize,
        sample: &ControlSample,
        out: &mut Vec<ActionEvent>,
    ) {
        if self.phase == Phase::Disabled {
            return;
        }
        let mut requests = std::mem::take(&mut self.scratch);
        requests.clear();
        let binding = &mut self.bindings[index];
        binding.process(sample, &mut requests);
        if requests.is_empty() {
            self.scratch = requests;
            return;
        }

        let control = binding
            .controls
            .iter()
            .find(|c| c.device == sample.device && c.control == sample.control)
            .map_or_else(|| binding.path.to_string(), ResolvedControl::path);
        let names: Vec<Option<String>> = requests
            .iter()
            .map(|r| r.interaction.map(|i| binding.slots[i].interaction.name().to_string()))
            .collect();

        let mut yielded = false;
        for (request, interaction) in requests.iter().zip(names) {
            if let Some(driving) = self.driving {
                if driving != index {
                    tracing::trace!(
                        "Action '{}': binding {} ignored while binding {} drives",
                        self.name,
                        index,
                        driving
                    );
                    yielded = true;
                    continue;
                }
            }
            if !self.phase.can_transition_to(request.phase) {
                tracing::warn!(
                    "Action '{}': ignoring {} request while {}",
                    self.name,
                    request.phase,
                    self.phase
                );
                continue;
            }
            if request.phase == Phase::Started {
                self.driving = Some(index);
            }
            self.emit(request.phase, sample.time, control.clone(), interaction, out);
        }
        if yielded {
            self.bindings[index].yield_to_driver(sample);
        }
        self.scratch = requests;
    }

    fn emit(
        &mut self,
        phase: Phase,
        time: Timestamp,
        control: String,
        interaction: Option<String>,
        out: &mut Vec<ActionEvent>,
    ) {
        let start_time = if phase == Phase::Started || self.phase != Phase::Started {
            time
        } else {
            self.start_time
        };
        tracing::trace!("Action '{}' {} at {}", self.name, phase, time);
        out.push(ActionEvent {
            action: self.name.clone(),
            phase,
            time,
            control: control.clone(),
            interaction: interaction.clone(),
            start_time,
            duration: ticks_to_seconds(time.saturating_sub(start_time)),
        });

        if phase.is_completion() {
            self.phase = Phase::Waiting;
            self.driving = None;
        } else {
            self.phase = phase;
            self.start_time = time;
            self.start_control = control;
            self.start_interaction = interaction;
        }
    }
}
