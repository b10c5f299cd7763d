//! Camera Capture Library for the Companion Computer
//!
//! Discovers capture devices and supervises the external capture pipeline.
//! Supports:
//! - Video device discovery through a capability script (JSON catalog)
//! - Still sensor discovery through `v4l2-ctl` sub-device queries
//! - One supervised capture process per session (streaming, photo, video)

pub mod args;
pub mod error;
pub mod host;
pub mod probe;
pub mod supervisor;
pub mod types;
pub mod validation;

pub use args::{build_command, LaunchConfig, Platform};
pub use error::{LaunchError, ProbeError, RuntimeError, ValidationError};
pub use host::{HostInfo, SystemHost};
pub use probe::{CapabilityProber, CommandProber, ProbeConfig};
pub use supervisor::{CaptureSupervisor, ProcessExit, ProcessHandle, ProcessSupervisor, SessionId};
pub use types::{
    CameraMode, CaptureDevice, CatalogKind, Compression, DeviceCapability, FrameRateOption,
    SessionSettings, StillSettings, StreamSettings, Transport, VideoSettings,
};
pub use validation::{validate_selection, Selection};

/// Default RTSP server port of the streaming pipeline
pub const DEFAULT_RTSP_PORT: u16 = 8554;
