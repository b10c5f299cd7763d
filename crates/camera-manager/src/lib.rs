//! Camera Mode Manager
//!
//! Owns the camera state machine and everything that drives it:
//! - Idle / Active(mode) transitions with revalidation of saved settings
//! - Protocol bridge replies and the periodic heartbeat
//! - A single service task serializing all transitions
//! - Typed outbound events on a bounded channel

mod bridge;
mod error;
mod events;
mod manager;
pub mod persist;
mod service;
mod state;

#[cfg(test)]
mod testing;

pub use bridge::{camera_information, camera_settings, stream_information};
pub use error::CameraError;
pub use events::{CameraEvent, EventSink};
pub use manager::{CameraDeps, CameraManager, ManagerConfig, HEARTBEAT_PERIOD};
pub use service::{CameraHandle, CameraService, ServiceConfig};
pub use state::{CameraState, DeviceCatalog, StartOutcome, SystemStatus};
