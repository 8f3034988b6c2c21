//! Error handling for input-ingress
//!
//! This module defines the crate-level error type and a Result alias used
//! by the runtime, configuration and binding layers. Pipeline compilation
//! has its own error type in [`crate::pipeline::error`] which converts into
//! [`IngressError`].

use crate::pipeline::PipelineError;
use crate::state::StateError;
use crate::types::DeviceId;
use thiserror::Error;

/// Main error type for input-ingress operations
#[derive(Error, Debug)]
pub enum IngressError {
    /// Pipeline compilation or execution failed
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// State arena access failed
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// A control path could not be parsed
    #[error("Invalid control path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A binding could not be attached to its controls
    #[error("Binding error for '{path}': {message}")]
    Binding { path: String, message: String },

    /// Interaction name not present in the registry
    #[error("Unknown interaction '{0}'")]
    UnknownInteraction(String),

    /// Interaction parameter list could not be parsed
    #[error("Invalid interaction parameter '{0}'")]
    InvalidInteractionParameter(String),

    /// Device id not registered with the runtime
    #[error("Unknown device {0}")]
    UnknownDevice(DeviceId),

    /// Action map id not registered with the runtime
    #[error("Unknown action map '{0}'")]
    UnknownActionMap(String),

    /// Binary event could not be decoded
    #[error("Event decode error: {0}")]
    EventDecode(String),

    /// Device command could not be decoded or dispatched
    #[error("Command error: {0}")]
    Command(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<IngressError>,
    },
}

impl IngressError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        IngressError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for errors a caller caused through configuration (bad paths,
    /// mismatched interactions, out-of-bounds fields).
    pub fn is_configuration(&self) -> bool {
        match self {
            IngressError::Config(_)
            | IngressError::InvalidPath { .. }
            | IngressError::Binding { .. }
            | IngressError::UnknownInteraction(_)
            | IngressError::InvalidInteractionParameter(_) => true,
            IngressError::Pipeline(e) => e.is_configuration(),
            IngressError::WithContext { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

/// Result type alias for input-ingress operations
pub type Result<T> = std::result::Result<T, IngressError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| IngressError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| IngressError::from(e).with_context(f()))
    }
}
