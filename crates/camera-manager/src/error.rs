//! Camera Error Types

use camera_capture::{CameraMode, LaunchError, ProbeError, ValidationError};
use storage::StorageError;
use thiserror::Error;

/// Errors returned by camera operations
#[derive(Debug, Error)]
pub enum CameraError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A session is already running
    #[error("Camera already active in {0} mode")]
    AlreadyActive(CameraMode),

    #[error("Camera is not active")]
    NotActive,

    #[error("Operation requires {expected} mode, camera is in {actual} mode")]
    ModeMismatch { expected: CameraMode, actual: CameraMode },

    #[error("No capture process is running")]
    NoProcess,

    /// The camera service task is gone
    #[error("Camera service unavailable")]
    Busy,
}
