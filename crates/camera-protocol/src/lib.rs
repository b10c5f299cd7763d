//! Camera Component Protocol
//!
//! This crate models the handful of vehicle telemetry messages the camera
//! component consumes and produces. Framing and transport belong to the
//! vehicle link; only the typed payloads live here.

mod error;
mod message;

pub use error::ProtocolError;
pub use message::{
    CameraInformation, CameraModeId, CameraRequest, CameraSettings, CameraTrigger, CommandAck,
    CommandResult, Heartbeat, InboundCommand, OutboundMessage, Route, VideoStreamInformation,
    VideoStreamType,
};

/// Component identifiers
pub mod component {
    /// Camera component #1
    pub const CAMERA: u8 = 100;
}

/// Message identifiers used as request parameters
pub mod message_id {
    /// COMMAND_LONG
    pub const COMMAND_LONG: u32 = 76;
    /// CAMERA_TRIGGER
    pub const CAMERA_TRIGGER: u32 = 112;
    /// CAMERA_INFORMATION
    pub const CAMERA_INFORMATION: u32 = 259;
    /// CAMERA_SETTINGS
    pub const CAMERA_SETTINGS: u32 = 260;
    /// VIDEO_STREAM_INFORMATION
    pub const VIDEO_STREAM_INFORMATION: u32 = 269;
}

/// Command codes
pub mod command {
    /// Trigger the still camera
    pub const DO_DIGICAM_CONTROL: u16 = 203;
    /// Request a single message by id (param1)
    pub const REQUEST_MESSAGE: u16 = 512;
}

/// Camera capability flags
pub mod cap_flags {
    /// Camera can record video
    pub const CAPTURE_VIDEO: u32 = 1;
    /// Camera can capture still images
    pub const CAPTURE_IMAGE: u32 = 2;
    /// Camera exposes a video stream
    pub const HAS_VIDEO_STREAM: u32 = 256;
}

/// Video stream status flags
pub mod stream_flags {
    /// Stream is running
    pub const RUNNING: u16 = 1;
    /// Stream is thermal imaging
    pub const THERMAL: u16 = 2;
}

/// Heartbeat identity values
pub mod heartbeat {
    /// MAV_TYPE_CAMERA
    pub const TYPE_CAMERA: u8 = 30;
    /// MAV_AUTOPILOT_INVALID
    pub const AUTOPILOT_INVALID: u8 = 8;
}
