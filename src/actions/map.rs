//! Action maps: named groups of actions enabled and disabled together.

use super::action::{Action, ActionEvent, Binding, ControlSample};
use super::registry::InteractionRegistry;
use crate::controls::{ControlPath, ControlResolver, DeviceLayout, DeviceView};
use crate::error::{IngressError, Result, ResultExt};
use crate::state::StateMemory;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Callback receiving every phase event of a map, in emission order.
pub type Subscriber = Box<dyn FnMut(&ActionEvent) + Send>;

/// Serializable description of an action map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMapDef {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: String,
    #[serde(default)]
    pub bindings: Vec<BindingDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingDef {
    pub path: String,
    /// Interaction list, e.g. `hold(duration=0.5)`; empty for default behavior
    #[serde(default)]
    pub interactions: String,
}

impl ActionMapDef {
    /// Parse paths and interactions into a disabled map.
    pub fn build(&self, registry: &InteractionRegistry) -> Result<ActionMap> {
        let mut map = ActionMap::new(&self.name);
        for def in &self.actions {
            let mut action = Action::new(&def.name);
            for binding in &def.bindings {
                let path = ControlPath::parse(&binding.path)?;
                let interactions = registry
                    .parse(&binding.interactions)
                    .with_context(|| format!("action '{}' binding {}", def.name, binding.path))?;
                action.add_binding(Binding::new(path, interactions));
            }
            map.add_action(action)?;
        }
        Ok(map)
    }
}

pub struct ActionMap {
    name: String,
    actions: Vec<Action>,
    enabled: bool,
    subscribers: Vec<Subscriber>,
}

impl ActionMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            enabled: false,
            subscribers: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Result<Self> {
        self.add_action(action)?;
        Ok(self)
    }

    pub fn add_action(&mut self, action: Action) -> Result<()> {
        if self.action(action.name()).is_some() {
            return Err(IngressError::Config(format!(
                "action map '{}' already has an action named '{}'",
                self.name,
                action.name()
            )));
        }
        self.actions.push(action);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&ActionEvent) + Send + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    /// Check every binding against the known layouts. Bindings that fail
    /// are removed from their action and their errors returned.
    pub fn validate(&mut self, layouts: &[&DeviceLayout]) -> Vec<IngressError> {
        let mut errors = Vec::new();
        for action in &mut self.actions {
            let mut index = 0;
            while index < action.bindings().len() {
                let binding = &action.bindings()[index];
                match check_binding(binding, layouts) {
                    Ok(()) => index += 1,
                    Err(err) => {
                        tracing::warn!("Action '{}': rejected binding: {}", action.name(), err);
                        errors.push(err);
                        action.remove_binding(index);
                    }
                }
            }
        }
        errors
    }

    /// Resolve bindings against `devices` and move every action to Waiting.
    pub fn enable(&mut self, devices: &[DeviceView], memory: &StateMemory) {
        self.bind(devices, memory);
        for action in &mut self.actions {
            action.enable();
        }
        self.enabled = true;
        tracing::debug!("Enabled action map '{}'", self.name);
    }

    /// Re-resolve bindings after the device set changed. In-flight actions
    /// are canceled first.
    pub fn rebind(
        &mut self,
        devices: &[DeviceView],
        memory: &StateMemory,
        time: Timestamp,
        out: &mut Vec<ActionEvent>,
    ) {
        if !self.enabled {
            return;
        }
        let start = out.len();
        for action in &mut self.actions {
            action.interrupt(time, out);
        }
        self.bind(devices, memory);
        self.notify(&out[start..]);
    }

    pub fn disable(&mut self, time: Timestamp, out: &mut Vec<ActionEvent>) {
        if !self.enabled {
            return;
        }
        let start = out.len();
        for action in &mut self.actions {
            action.disable(time, out);
        }
        self.enabled = false;
        self.notify(&out[start..]);
        tracing::debug!("Disabled action map '{}'", self.name);
    }

    /// Feed one control sample to every watching binding, actions in
    /// declaration order, bindings in declaration order.
    pub fn process(&mut self, sample: &ControlSample, out: &mut Vec<ActionEvent>) {
        if !self.enabled {
            return;
        }
        for a in 0..self.actions.len() {
            for b in 0..self.actions[a].bindings().len() {
                if !self.actions[a].bindings()[b].watches(sample) {
                    continue;
                }
                let start = out.len();
                self.actions[a].process(b, sample, out);
                self.notify(&out[start..]);
            }
        }
    }

    fn bind(&mut self, devices: &[DeviceView], memory: &StateMemory) {
        for action in &mut self.actions {
            let name = action.name().to_string();
            for binding in action.bindings_mut() {
                let mut controls = match ControlResolver::resolve(binding.path(), devices) {
                    Ok(controls) => controls,
                    Err(err) => {
                        tracing::warn!("Action '{}': {}", name, err);
                        Vec::new()
                    }
                };
                controls.retain(|control| {
                    match binding.check_kind(control.kind(), &control.path()) {
                        Ok(()) => true,
                        Err(err) => {
                            tracing::warn!("Action '{}': {}", name, err);
                            false
                        }
                    }
                });
                let initial: Vec<f32> = controls.iter().map(|c| c.read(memory)).collect();
                binding.bind(controls, &initial);
            }
        }
    }

    fn notify(&mut self, events: &[ActionEvent]) {
        for event in events {
            for subscriber in &mut self.subscribers {
                subscriber(event);
            }
        }
    }
}

impl fmt::Debug for ActionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionMap")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .field("enabled", &self.enabled)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

fn check_binding(binding: &Binding, layouts: &[&DeviceLayout]) -> Result<()> {
    ControlResolver::validate(binding.path(), layouts.iter().copied())?;
    for layout in layouts {
        if !binding.path().matches_layout(layout) {
            continue;
        }
        if let Some(index) = binding.path().find_in(layout) {
            let control = &layout.controls[index];
            binding.check_kind(control.kind, &format!("<{}>/{}", layout.name, control.name))?;
        }
    }
    Ok(())
}
