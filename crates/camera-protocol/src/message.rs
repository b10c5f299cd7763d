//! Camera Message Definitions
//!
//! Inbound command packets and the outbound replies the camera component
//! sends back to the ground station.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::{command, component, message_id};

/// A command packet delivered by the vehicle link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundCommand {
    /// System id of the sender
    pub sender_system_id: u8,
    /// Component id of the sender
    pub sender_component_id: u8,
    /// Component the command is addressed to
    pub target_component: u8,
    /// Command code
    pub command: u16,
    /// Command parameters 1..7
    pub params: [f32; 7],
}

impl InboundCommand {
    /// Build a command with all parameters zeroed
    pub fn new(sender_system_id: u8, sender_component_id: u8, target_component: u8, command: u16) -> Self {
        Self {
            sender_system_id,
            sender_component_id,
            target_component,
            command,
            params: [0.0; 7],
        }
    }

    /// Build a request for a single message by id
    pub fn request_message(sender_system_id: u8, sender_component_id: u8, message: u32) -> Self {
        let mut cmd = Self::new(
            sender_system_id,
            sender_component_id,
            component::CAMERA,
            command::REQUEST_MESSAGE,
        );
        cmd.params[0] = message as f32;
        cmd
    }

    /// Message id requested through param1, if it holds one
    pub fn requested_message(&self) -> Option<u32> {
        let p = self.params[0];
        if p.is_finite() && p > 0.0 && p.fract() == 0.0 && p <= u32::MAX as f32 {
            Some(p as u32)
        } else {
            None
        }
    }

    /// Route for replies to this command
    pub fn reply_route(&self) -> Route {
        Route {
            target_system: self.sender_system_id,
            target_component: self.sender_component_id,
        }
    }
}

/// What an inbound command asks of the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraRequest {
    /// Send CAMERA_INFORMATION
    CameraInformation,
    /// Send VIDEO_STREAM_INFORMATION
    VideoStreamInformation,
    /// Send CAMERA_SETTINGS
    CameraSettings,
    /// Take a still photo now
    DigicamControl,
}

impl CameraRequest {
    /// Decode a command addressed to the camera component
    ///
    /// The requested-message parameter is checked before the command code.
    pub fn decode(cmd: &InboundCommand) -> Result<Self, ProtocolError> {
        if cmd.target_component != component::CAMERA {
            return Err(ProtocolError::NotAddressed(cmd.target_component));
        }

        match cmd.requested_message() {
            Some(message_id::CAMERA_INFORMATION) => return Ok(Self::CameraInformation),
            Some(message_id::VIDEO_STREAM_INFORMATION) => return Ok(Self::VideoStreamInformation),
            Some(message_id::CAMERA_SETTINGS) => return Ok(Self::CameraSettings),
            _ => {}
        }

        if cmd.command == command::DO_DIGICAM_CONTROL {
            return Ok(Self::DigicamControl);
        }

        Err(ProtocolError::UnknownCommand {
            command: cmd.command,
            param1: cmd.params[0],
        })
    }
}

/// Destination of an outbound reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub target_system: u8,
    pub target_component: u8,
}

/// Stream delivery type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VideoStreamType {
    /// Pull-based RTSP server
    Rtsp = 0,
    /// RTP pushed over UDP to a fixed destination
    RtpUdp = 1,
}

/// Camera mode as reported in CAMERA_SETTINGS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CameraModeId {
    Image = 0,
    Video = 1,
    ImageSurvey = 2,
}

/// Result codes for command acknowledgements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandResult {
    Accepted = 0,
    TemporarilyRejected = 1,
    Denied = 2,
    Unsupported = 3,
    Failed = 4,
}

/// CAMERA_INFORMATION payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraInformation {
    pub time_boot_ms: u32,
    pub vendor_name: String,
    pub model_name: String,
    pub firmware_version: u32,
    pub focal_length: Option<f32>,
    pub sensor_size_h: Option<f32>,
    pub sensor_size_v: Option<f32>,
    pub resolution_h: u16,
    pub resolution_v: u16,
    pub lens_id: u8,
    /// Capability bitmask, see [`crate::cap_flags`]
    pub flags: u32,
    pub cam_definition_version: u16,
    pub cam_definition_uri: String,
    pub gimbal_device_id: u8,
}

/// VIDEO_STREAM_INFORMATION payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInformation {
    pub stream_id: u8,
    pub count: u8,
    pub stream_type: VideoStreamType,
    /// Status bitmask, see [`crate::stream_flags`]
    pub flags: u16,
    pub framerate: f32,
    pub resolution_h: u16,
    pub resolution_v: u16,
    /// Bitrate in kbit/s
    pub bitrate: u32,
    /// Rotation in degrees
    pub rotation: u16,
    pub hfov: u16,
    pub name: String,
    /// RTSP URI, or the destination UDP port for RTP
    pub uri: String,
}

/// CAMERA_SETTINGS payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub time_boot_ms: u32,
    pub mode_id: CameraModeId,
    pub zoom_level: Option<f32>,
    pub focus_level: Option<f32>,
}

/// CAMERA_TRIGGER payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraTrigger {
    /// Capture timestamp (microseconds since UNIX epoch)
    pub time_usec: u64,
    /// Image sequence number
    pub seq: u32,
}

/// COMMAND_ACK payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub command: u16,
    pub result: CommandResult,
    pub route: Route,
}

/// HEARTBEAT identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub vehicle_type: u8,
    pub autopilot: u8,
    pub component: u8,
}

impl Heartbeat {
    /// Heartbeat advertising a camera component
    pub fn camera() -> Self {
        Self {
            vehicle_type: crate::heartbeat::TYPE_CAMERA,
            autopilot: crate::heartbeat::AUTOPILOT_INVALID,
            component: component::CAMERA,
        }
    }
}

/// Messages handed to the vehicle link for transmission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutboundMessage {
    CameraInformation { route: Route, info: CameraInformation },
    VideoStreamInformation { route: Route, info: VideoStreamInformation },
    CameraSettings { route: Route, settings: CameraSettings },
    CameraTrigger(CameraTrigger),
    CommandAck(CommandAck),
    Heartbeat(Heartbeat),
}

impl OutboundMessage {
    /// Short message name for logging
    pub fn name(&self) -> &'static str {
        match self {
            OutboundMessage::CameraInformation { .. } => "CAMERA_INFORMATION",
            OutboundMessage::VideoStreamInformation { .. } => "VIDEO_STREAM_INFORMATION",
            OutboundMessage::CameraSettings { .. } => "CAMERA_SETTINGS",
            OutboundMessage::CameraTrigger(_) => "CAMERA_TRIGGER",
            OutboundMessage::CommandAck(_) => "COMMAND_ACK",
            OutboundMessage::Heartbeat(_) => "HEARTBEAT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_requested_messages() {
        let info = InboundCommand::request_message(1, 1, message_id::CAMERA_INFORMATION);
        assert_eq!(CameraRequest::decode(&info).unwrap(), CameraRequest::CameraInformation);

        let stream = InboundCommand::request_message(1, 1, message_id::VIDEO_STREAM_INFORMATION);
        assert_eq!(
            CameraRequest::decode(&stream).unwrap(),
            CameraRequest::VideoStreamInformation
        );

        let settings = InboundCommand::request_message(1, 1, message_id::CAMERA_SETTINGS);
        assert_eq!(CameraRequest::decode(&settings).unwrap(), CameraRequest::CameraSettings);
    }

    #[test]
    fn test_decode_digicam_control() {
        let cmd = InboundCommand::new(1, 190, component::CAMERA, command::DO_DIGICAM_CONTROL);
        assert_eq!(CameraRequest::decode(&cmd).unwrap(), CameraRequest::DigicamControl);
    }

    #[test]
    fn test_decode_rejects_other_component() {
        let mut cmd = InboundCommand::request_message(1, 1, message_id::CAMERA_INFORMATION);
        cmd.target_component = 1;
        assert_eq!(CameraRequest::decode(&cmd), Err(ProtocolError::NotAddressed(1)));
    }

    #[test]
    fn test_decode_unknown_command() {
        let cmd = InboundCommand::new(1, 1, component::CAMERA, 400);
        assert!(matches!(
            CameraRequest::decode(&cmd),
            Err(ProtocolError::UnknownCommand { command: 400, .. })
        ));
    }

    #[test]
    fn test_requested_message_ignores_fractional_param() {
        let mut cmd = InboundCommand::new(1, 1, component::CAMERA, command::REQUEST_MESSAGE);
        cmd.params[0] = 259.5;
        assert_eq!(cmd.requested_message(), None);
        cmd.params[0] = f32::NAN;
        assert_eq!(cmd.requested_message(), None);
    }

    #[test]
    fn test_reply_route_targets_sender() {
        let cmd = InboundCommand::new(7, 190, component::CAMERA, command::DO_DIGICAM_CONTROL);
        let route = cmd.reply_route();
        assert_eq!(route.target_system, 7);
        assert_eq!(route.target_component, 190);
    }

    #[test]
    fn test_outbound_serializes_with_variant_name() {
        let msg = OutboundMessage::Heartbeat(Heartbeat::camera());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("Heartbeat"));
        assert_eq!(msg.name(), "HEARTBEAT");
    }

    proptest! {
        #[test]
        fn prop_commands_for_other_components_never_decode(target in 0u8..=255, code in 0u16..1000) {
            prop_assume!(target != component::CAMERA);
            let cmd = InboundCommand::new(1, 1, target, code);
            prop_assert!(CameraRequest::decode(&cmd).is_err());
        }
    }
}
