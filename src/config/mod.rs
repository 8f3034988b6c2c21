//! Configuration module for input-ingress
//!
//! This module holds the tunables of a runtime: interaction defaults,
//! pipeline shaping parameters, event queue limits and logging. Every field
//! has a default, so a config file only needs the values it changes.
//!
//! # Config Location
//!
//! The default config file lives in the platform config directory:
//! - **Linux**: `~/.config/input-ingress/config.toml`
//! - **macOS**: `~/Library/Application Support/input-ingress/config.toml`
//! - **Windows**: `%APPDATA%\input-ingress\config.toml`
//!
//! # Example
//!
//! ```toml
//! [interaction]
//! hold_time = 0.6
//!
//! [pipeline]
//! stick_deadzone_min = 0.2
//!
//! [logging]
//! level = "debug"
//! ```

use crate::actions::InteractionSettings;
use crate::error::{IngressError, Result};
use crate::pipeline::stages::DEFAULT_MERGE_TOLERANCE;
use crate::pipeline::PipelineSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the platform config directory
pub const APP_DIR: &str = "input-ingress";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default number of samples each dataset axis is sized for
pub const DEFAULT_DATASET_CAPACITY: usize = 64;

/// Default bound of the cross-thread event channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default cap on events consumed in one tick
pub const DEFAULT_MAX_EVENTS_PER_TICK: usize = 4096;

// ==================== Config Directory ====================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Sections ====================

/// Pipeline shaping parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Values closer than this are equal when merging sources
    pub merge_tolerance: f32,
    /// Samples each dataset axis starts with room for
    pub initial_dataset_capacity: usize,
    pub stick_deadzone_min: f32,
    pub stick_deadzone_max: f32,
    pub trigger_press_point: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let settings = PipelineSettings::default();
        Self {
            merge_tolerance: DEFAULT_MERGE_TOLERANCE,
            initial_dataset_capacity: DEFAULT_DATASET_CAPACITY,
            stick_deadzone_min: settings.stick_deadzone_min,
            stick_deadzone_max: settings.stick_deadzone_max,
            trigger_press_point: settings.trigger_press_point,
        }
    }
}

impl PipelineConfig {
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            merge_tolerance: self.merge_tolerance,
            stick_deadzone_min: self.stick_deadzone_min,
            stick_deadzone_max: self.stick_deadzone_max,
            trigger_press_point: self.trigger_press_point,
        }
    }
}

/// Event queue limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub channel_capacity: usize,
    pub max_events_per_tick: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_events_per_tick: DEFAULT_MAX_EVENTS_PER_TICK,
        }
    }
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
    /// Daily rolling log files go here when set; stderr otherwise
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,input_ingress=debug".to_string(),
            json: false,
            log_dir: None,
        }
    }
}

// ==================== Ingress Config ====================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    pub interaction: InteractionSettings,
    pub pipeline: PipelineConfig,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
}

impl IngressConfig {
    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngressError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| e.with_context(format!("Failed to parse config file {:?}", path)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| IngressError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load from the platform config directory, if a file exists there
    pub fn load_default_location() -> Self {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_or_default(path),
            _ => Self::default(),
        }
    }

    /// Save as pretty TOML, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| IngressError::Serialization(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| {
            IngressError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values no runtime can work with
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        if !(0.0..=1.0).contains(&p.stick_deadzone_min)
            || !(0.0..=1.0).contains(&p.stick_deadzone_max)
            || p.stick_deadzone_min >= p.stick_deadzone_max
        {
            return Err(IngressError::Config(format!(
                "stick deadzone must satisfy 0 <= min < max <= 1, got {}..{}",
                p.stick_deadzone_min, p.stick_deadzone_max
            )));
        }
        if p.merge_tolerance < 0.0 {
            return Err(IngressError::Config(format!(
                "merge tolerance must be non-negative, got {}",
                p.merge_tolerance
            )));
        }
        if self.queue.channel_capacity == 0 || self.queue.max_events_per_tick == 0 {
            return Err(IngressError::Config(
                "queue capacities must be at least 1".to_string(),
            ));
        }
        let i = &self.interaction;
        if [i.tap_time, i.slow_tap_time, i.hold_time]
            .iter()
            .any(|t| *t < 0.0 || !t.is_finite())
        {
            return Err(IngressError::Config(
                "interaction times must be non-negative seconds".to_string(),
            ));
        }
        Ok(())
    }
}
