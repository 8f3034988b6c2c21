//! Control path parsing.
//!
//! Paths look like `<Gamepad>/buttonSouth` or `<*>/leftStick/x`. The part in
//! angle brackets names a device layout (`*` matches any); the rest names a
//! control. Subcontrol components are concatenated, so `leftStick/x`
//! addresses the `leftStickX` control. All matching is case-insensitive.

use crate::controls::DeviceLayout;
use crate::error::{IngressError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlPath {
    /// `None` for the `<*>` wildcard
    layout: Option<String>,
    components: Vec<String>,
}

impl ControlPath {
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason: &str| IngressError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let rest = path
            .trim()
            .strip_prefix('<')
            .ok_or_else(|| invalid("must start with '<Layout>'"))?;
        let (layout, rest) = rest
            .split_once('>')
            .ok_or_else(|| invalid("missing '>' after layout name"))?;
        if layout.is_empty() {
            return Err(invalid("empty layout name"));
        }

        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| invalid("expected '/' after layout"))?;
        let components: Vec<String> = rest.split('/').map(str::to_string).collect();
        if components.iter().any(|c| c.is_empty()) {
            return Err(invalid("empty control name"));
        }

        Ok(Self {
            layout: (layout != "*").then(|| layout.to_string()),
            components,
        })
    }

    pub fn layout(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    /// Control name within the layout.
    pub fn control_name(&self) -> String {
        self.components.concat()
    }

    pub fn matches_layout(&self, layout: &DeviceLayout) -> bool {
        self.layout
            .as_deref()
            .map_or(true, |name| name.eq_ignore_ascii_case(&layout.name))
    }

    /// Index of the addressed control in `layout`, if the layout matches.
    pub fn find_in(&self, layout: &DeviceLayout) -> Option<usize> {
        if !self.matches_layout(layout) {
            return None;
        }
        layout.find(&self.control_name())
    }
}

impl fmt::Display for ControlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}>/{}",
            self.layout.as_deref().unwrap_or("*"),
            self.components.join("/")
        )
    }
}

impl FromStr for ControlPath {
    type Err = IngressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ControlPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ControlPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
