//! Binding control paths to state memory.
//!
//! Resolution happens once, at bind time: the result carries the state
//! block and precomputed field mask, so reading a control afterwards is a
//! single masked read from the front buffer.

use super::layout::{ControlKind, ControlLayout, DeviceLayout};
use super::path::ControlPath;
use crate::error::{IngressError, Result};
use crate::state::{FieldMask, StateBlock, StateMemory};
use crate::types::DeviceId;
use std::sync::Arc;

/// A device as seen by the resolver: its exposed block and layout.
#[derive(Debug, Clone)]
pub struct DeviceView {
    pub id: DeviceId,
    pub block: StateBlock,
    pub layout: Arc<DeviceLayout>,
}

/// A control path bound to one device's state.
#[derive(Debug, Clone)]
pub struct ResolvedControl {
    pub device: DeviceId,
    pub block: StateBlock,
    pub layout: Arc<DeviceLayout>,
    /// Index into the layout's controls
    pub control: usize,
    pub mask: FieldMask,
}

impl ResolvedControl {
    pub fn control_layout(&self) -> &ControlLayout {
        &self.layout.controls[self.control]
    }

    pub fn kind(&self) -> ControlKind {
        self.control_layout().kind
    }

    /// Canonical path of the bound control, e.g. `<Gamepad>/buttonSouth`.
    pub fn path(&self) -> String {
        format!("<{}>/{}", self.layout.name, self.control_layout().name)
    }

    /// Current value from the front buffer.
    pub fn read(&self, memory: &StateMemory) -> f32 {
        self.control_layout()
            .decode(memory.read_field(&self.block, &self.mask))
    }
}

/// Resolves control paths against known layouts and live devices.
pub struct ControlResolver;

impl ControlResolver {
    /// Check `path` addresses a control of at least one known layout.
    pub fn validate<'a>(
        path: &ControlPath,
        layouts: impl IntoIterator<Item = &'a DeviceLayout>,
    ) -> Result<()> {
        let mut layout_seen = false;
        for layout in layouts {
            if !path.matches_layout(layout) {
                continue;
            }
            layout_seen = true;
            if path.find_in(layout).is_some() {
                return Ok(());
            }
        }
        let message = if layout_seen {
            format!("no control named '{}'", path.control_name())
        } else {
            "no registered layout matches".to_string()
        };
        Err(IngressError::Binding {
            path: path.to_string(),
            message,
        })
    }

    /// Every control on `devices` addressed by `path`, in device order.
    pub fn resolve<'a>(
        path: &ControlPath,
        devices: impl IntoIterator<Item = &'a DeviceView>,
    ) -> Result<Vec<ResolvedControl>> {
        let mut resolved = Vec::new();
        for device in devices {
            let Some(control) = path.find_in(&device.layout) else {
                continue;
            };
            let field = device.layout.controls[control].field;
            let mask = field.mask(device.layout.word_count())?;
            resolved.push(ResolvedControl {
                device: device.id,
                block: device.block,
                layout: Arc::clone(&device.layout),
                control,
                mask,
            });
        }
        tracing::trace!("Resolved {} to {} controls", path, resolved.len());
        Ok(resolved)
    }
}
