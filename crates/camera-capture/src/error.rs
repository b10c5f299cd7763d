//! Capture Error Types

use serde::Serialize;
use thiserror::Error;

use crate::types::CatalogKind;

/// Errors from device discovery
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// Discovery tool failed to run, exited non-zero or wrote unexpected stderr
    #[error("Discovery tool {tool} failed: {message}")]
    ToolFailure { tool: String, message: String },

    /// Discovery succeeded but reported nothing
    #[error("No {0} devices found")]
    NoDevicesFound(CatalogKind),

    /// Discovery output could not be parsed
    #[error("Unparseable discovery output: {0}")]
    ParseFailure(String),
}

/// Errors from checking requested settings against a probed catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Device id not present in the catalog
    #[error("No capture device: {0}")]
    DeviceNotFound(String),

    /// Device present but does not offer the resolution/format
    #[error("Device {device} does not support {width}x{height} {format}")]
    CapabilityNotFound {
        device: String,
        width: u32,
        height: u32,
        format: String,
    },

    /// A setting is outside its allowed range
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}

/// Errors from starting or signalling the capture process
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// Process could not be spawned
    #[error("Failed to spawn capture process: {0}")]
    SpawnFailure(String),

    /// Control signal could not be delivered
    #[error("Failed to signal capture process: {0}")]
    SignalFailure(String),
}

/// Errors raised while a session is running
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum RuntimeError {
    /// Capture process ended without being asked to
    #[error("Capture process crashed (code {code:?}, signal {signal:?})")]
    ProcessCrashed {
        code: Option<i32>,
        signal: Option<i32>,
    },
}
