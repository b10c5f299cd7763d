//! Camera state and the snapshots handed out to callers

use camera_capture::{
    CameraMode, CaptureDevice, CatalogKind, DeviceCapability, ProcessHandle, SessionSettings, Transport,
};
use serde::Serialize;
use std::net::Ipv4Addr;

/// The single authoritative camera state
///
/// Idle: `active == false`, no process, no settings.
/// Active(mode): `active == true`, one process, settings for `mode`.
#[derive(Debug, Default)]
pub struct CameraState {
    pub active: bool,
    pub mode: CameraMode,
    pub settings: Option<SessionSettings>,
    pub use_heartbeat: bool,
    pub process: Option<ProcessHandle>,
    pub stream_addresses: Vec<String>,
    /// Local recording running (video mode)
    pub recording: bool,
}

impl CameraState {
    /// Back to Idle; mode and heartbeat preference survive
    pub fn reset(&mut self) -> Option<ProcessHandle> {
        self.active = false;
        self.settings = None;
        self.stream_addresses.clear();
        self.recording = false;
        self.process.take()
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            active: self.active,
            mode: self.mode,
            addresses: self.stream_addresses.clone(),
            use_heartbeat: self.use_heartbeat,
            recording: self.recording,
            device: self.settings.as_ref().map(|s| s.device_id().to_string()),
        }
    }
}

/// Snapshot for UI polling
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SystemStatus {
    pub active: bool,
    pub mode: CameraMode,
    pub addresses: Vec<String>,
    pub use_heartbeat: bool,
    pub recording: bool,
    pub device: Option<String>,
}

/// Reply to a successful start
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartOutcome {
    pub active: bool,
    /// RTSP URLs clients can reach the stream at
    pub addresses: Vec<String>,
    /// Receive pipeline for UDP delivery
    pub receiver_pipeline: Option<String>,
}

/// Device catalog plus what is (or would be) selected, for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCatalog {
    pub kind: CatalogKind,
    pub devices: Vec<CaptureDevice>,
    pub active: bool,
    pub mode: CameraMode,
    pub selected_device: Option<String>,
    pub selected_capability: Option<DeviceCapability>,
    /// Running settings, or a template built from the selection
    pub settings: Option<SessionSettings>,
    /// UDP destination prefilled for the operator
    pub default_udp: Transport,
    pub interfaces: Vec<Ipv4Addr>,
}
