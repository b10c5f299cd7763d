//! Protocol Bridge
//!
//! Translates the running session into telemetry replies. Dispatch itself
//! lives on [`crate::CameraManager::handle_command`], which owns the state
//! these functions read.

use camera_capture::host::rtsp_path;
use camera_capture::{SessionSettings, StreamSettings, Transport};
use camera_protocol::{
    cap_flags, stream_flags, CameraInformation, CameraModeId, CameraSettings, CommandAck, CommandResult,
    InboundCommand, VideoStreamInformation, VideoStreamType,
};

const VENDOR_NAME: &str = "Companion";

fn saturate_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// CAMERA_INFORMATION for the running session
pub fn camera_information(settings: &SessionSettings, time_boot_ms: u32) -> CameraInformation {
    let (width, height) = settings.resolution();
    let flags = match settings {
        SessionSettings::Photo(_) => cap_flags::CAPTURE_IMAGE,
        _ => cap_flags::HAS_VIDEO_STREAM,
    };

    CameraInformation {
        time_boot_ms,
        vendor_name: VENDOR_NAME.to_string(),
        model_name: settings.device_id().to_string(),
        resolution_h: saturate_u16(width),
        resolution_v: saturate_u16(height),
        flags,
        ..Default::default()
    }
}

/// VIDEO_STREAM_INFORMATION for a streaming session
///
/// UDP delivery reports the destination port as the URI; RTSP reports the
/// server URL on the advertised address.
pub fn stream_information(stream: &StreamSettings, rtsp_port: u16) -> VideoStreamInformation {
    let video = &stream.video;
    let (stream_type, uri) = match stream.transport {
        Transport::Udp { port, .. } => (VideoStreamType::RtpUdp, port.to_string()),
        Transport::Rtsp => (
            VideoStreamType::Rtsp,
            format!("rtsp://{}:{}/{}", stream.advertised_ip, rtsp_port, rtsp_path(&video.device)),
        ),
    };

    VideoStreamInformation {
        stream_id: 1,
        count: 1,
        stream_type,
        flags: stream_flags::RUNNING,
        framerate: video.fps as f32,
        resolution_h: saturate_u16(video.width),
        resolution_v: saturate_u16(video.height),
        bitrate: video.bitrate,
        rotation: video.rotation,
        hfov: 0,
        name: video.device.clone(),
        uri,
    }
}

/// CAMERA_SETTINGS for the running session
pub fn camera_settings(settings: &SessionSettings, time_boot_ms: u32) -> CameraSettings {
    let mode_id = match settings {
        SessionSettings::Photo(_) => CameraModeId::Image,
        _ => CameraModeId::Video,
    };
    CameraSettings {
        time_boot_ms,
        mode_id,
        zoom_level: None,
        focus_level: None,
    }
}

pub fn ack(cmd: &InboundCommand, result: CommandResult) -> CommandAck {
    CommandAck {
        command: cmd.command,
        result,
        route: cmd.reply_route(),
    }
}
