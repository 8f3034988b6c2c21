//! Scripted input replay.
//!
//! A replay script names devices by registered layout, loads action maps
//! and then plays frames: each frame sets native controls to values at a
//! time, and the touched devices report their full native state. One tick
//! runs per frame.
//!
//! ```json
//! {
//!   "devices": [{ "name": "pad", "layout": "XInputGamepad" }],
//!   "action_maps": [{ "name": "play", "actions": [
//!     { "name": "fire", "bindings": [{ "path": "<Gamepad>/buttonSouth", "interactions": "hold(duration=0.5)" }] }
//!   ]}],
//!   "frames": [
//!     { "time": 0.0, "set": [{ "device": "pad", "control": "buttonSouth", "value": 1 }] },
//!     { "time": 0.6, "set": [{ "device": "pad", "control": "buttonSouth", "value": 0 }] }
//!   ]
//! }
//! ```

use crate::actions::{ActionEvent, ActionMapDef};
use crate::controls::DeviceLayout;
use crate::error::{IngressError, Result};
use crate::events::InputEvent;
use crate::runtime::InputRuntime;
use crate::state::word_count;
use crate::types::{seconds_to_ticks, DeviceId, TickStats};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub devices: Vec<ReplayDevice>,
    #[serde(default)]
    pub action_maps: Vec<ActionMapDef>,
    #[serde(default)]
    pub frames: Vec<ReplayFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDevice {
    pub name: String,
    /// Name of a registered device layout
    pub layout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Seconds
    pub time: f64,
    #[serde(default)]
    pub set: Vec<ControlWrite>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlWrite {
    pub device: String,
    pub control: String,
    pub value: f32,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayOutput {
    pub ticks: usize,
    pub events: Vec<ActionEvent>,
    /// Bindings rejected when loading the action maps
    pub rejected_bindings: Vec<String>,
    /// Totals over every tick
    pub totals: TickStats,
}

struct ReplayState {
    id: DeviceId,
    layout: Arc<DeviceLayout>,
    state: Vec<u8>,
    dirty: bool,
}

/// Play `script` through `runtime`.
pub fn run(runtime: &mut InputRuntime, script: &ReplayScript) -> Result<ReplayOutput> {
    let mut devices: HashMap<&str, ReplayState> = HashMap::new();
    for device in &script.devices {
        let layout = runtime
            .compiler()
            .registry()
            .layout_by_name(&device.layout)
            .cloned()
            .ok_or_else(|| {
                IngressError::Config(format!(
                    "device '{}': no layout named '{}'",
                    device.name, device.layout
                ))
            })?;
        let id = runtime.add_device(layout.as_ref().clone())?;
        devices.insert(
            &device.name,
            ReplayState {
                id,
                state: vec![0; layout.state_size as usize],
                layout,
                dirty: false,
            },
        );
    }

    let mut output = ReplayOutput::default();
    for def in &script.action_maps {
        let rejected = runtime.load_action_map(def)?;
        output
            .rejected_bindings
            .extend(rejected.iter().map(ToString::to_string));
        runtime.enable_action_map(&def.name)?;
    }

    for frame in &script.frames {
        let time = seconds_to_ticks(frame.time);
        for write in &frame.set {
            let device = devices.get_mut(write.device.as_str()).ok_or_else(|| {
                IngressError::Config(format!(
                    "frame at {}s: unknown device '{}'",
                    frame.time, write.device
                ))
            })?;
            let control = device.layout.control(&write.control).ok_or_else(|| {
                IngressError::Config(format!(
                    "frame at {}s: {} has no control '{}'",
                    frame.time, device.layout.name, write.control
                ))
            })?;
            control
                .field
                .mask(word_count(device.state.len()))?
                .inject(&mut device.state, control.encode(write.value));
            device.dirty = true;
        }
        for device in devices.values_mut().filter(|d| d.dirty) {
            device.dirty = false;
            runtime.queue_event(InputEvent::state(
                device.id,
                time,
                device.layout.format,
                device.state.clone(),
            ));
        }

        let report = runtime.update()?;
        output.ticks += 1;
        accumulate(&mut output.totals, &report.stats);
        output.events.extend(report.events);
    }
    Ok(output)
}

fn accumulate(totals: &mut TickStats, tick: &TickStats) {
    totals.tick = tick.tick;
    totals.events_processed += tick.events_processed;
    totals.events_dropped += tick.events_dropped;
    totals.commands_dispatched += tick.commands_dispatched;
    totals.samples_demuxed += tick.samples_demuxed;
    totals.stages_executed += tick.stages_executed;
    totals.action_events += tick.action_events;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Phase;
    use crate::config::IngressConfig;

    const SCRIPT: &str = r#"{
        "devices": [{ "name": "pad", "layout": "XInputGamepad" }],
        "action_maps": [{ "name": "play", "actions": [
            { "name": "charge", "bindings": [{ "path": "<Gamepad>/buttonSouth", "interactions": "hold(duration=0.5)" }] },
            { "name": "bogus", "bindings": [{ "path": "<Gamepad>/noSuchButton" }] }
        ]}],
        "frames": [
            { "time": 0.0, "set": [{ "device": "pad", "control": "buttonSouth", "value": 1 }] },
            { "time": 0.3, "set": [{ "device": "pad", "control": "buttonSouth", "value": 0 }] },
            { "time": 1.0, "set": [{ "device": "pad", "control": "buttonSouth", "value": 1 }] },
            { "time": 1.6, "set": [{ "device": "pad", "control": "buttonSouth", "value": 0 }] }
        ]
    }"#;

    #[test]
    fn test_replay_hold_scenario() {
        let script: ReplayScript = serde_json::from_str(SCRIPT).unwrap();
        let mut runtime = InputRuntime::new(IngressConfig::default()).unwrap();
        let output = run(&mut runtime, &script).unwrap();

        assert_eq!(output.ticks, 4);
        assert_eq!(output.rejected_bindings.len(), 1);
        let phases: Vec<_> = output.events.iter().map(|e| e.phase).collect();
        assert_eq!(
            phases,
            [Phase::Started, Phase::Canceled, Phase::Started, Phase::Performed]
        );
        assert_eq!(output.totals.events_processed, 4);
    }

    #[test]
    fn test_frame_writes_reach_native_state() {
        let script: ReplayScript = serde_json::from_str(
            r#"{
                "devices": [{ "name": "pad", "layout": "HidGamepad" }],
                "frames": [{ "time": 0.1, "set": [
                    { "device": "pad", "control": "buttonEast", "value": 1 },
                    { "device": "pad", "control": "rightTrigger", "value": 255 }
                ]}]
            }"#,
        )
        .unwrap();
        let mut runtime = InputRuntime::new(IngressConfig::default()).unwrap();
        let output = run(&mut runtime, &script).unwrap();
        assert_eq!(output.totals.events_processed, 1);

        let pad = runtime.device_ids().next().unwrap();
        assert_eq!(runtime.read_control(pad, "<Gamepad>/buttonEast").unwrap(), 1.0);
        assert_eq!(runtime.read_control(pad, "<Gamepad>/buttonSouth").unwrap(), 0.0);
        assert!((runtime.read_control(pad, "<Gamepad>/rightTrigger").unwrap() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_layout_is_config_error() {
        let script: ReplayScript = serde_json::from_str(
            r#"{ "devices": [{ "name": "kb", "layout": "Keyboard" }] }"#,
        )
        .unwrap();
        let mut runtime = InputRuntime::new(IngressConfig::default()).unwrap();
        let err = run(&mut runtime, &script).unwrap_err();
        assert!(err.is_configuration());
    }
}
