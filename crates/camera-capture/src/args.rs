//! Capture process command lines
//!
//! One fixed mapping of settings to flags per mode. Streaming runs the RTSP
//! server script; photo and video modes run the mode script.

use crate::types::{SessionSettings, StillSettings, StreamSettings, Transport, VideoSettings};

/// Named camera that needs remapping on Ubuntu hosts
const UBUNTU_NAMED_CAMERA: &str = "rpicam";
const UBUNTU_CAMERA_PATH: &str = "/dev/video0";
const UBUNTU_CAMERA_FORMAT: &str = "video/x-raw";

/// Programs used to run capture sessions
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Interpreter running the scripts
    pub interpreter: String,
    /// Streaming pipeline (RTSP server / UDP push)
    pub stream_script: String,
    /// Photo / video recording pipeline
    pub mode_script: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            stream_script: "./python/rtsp-server.py".to_string(),
            mode_script: "./python/photomode.py".to_string(),
        }
    }
}

/// Host traits that change the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Platform {
    /// Host runs Ubuntu, where the Pi camera is only reachable as a V4L2 node
    pub ubuntu: bool,
}

/// Build `(program, args)` for a session
pub fn build_command(config: &LaunchConfig, settings: &SessionSettings, platform: Platform) -> (String, Vec<String>) {
    let args = match settings {
        SessionSettings::Streaming(stream) => stream_args(&config.stream_script, stream, platform),
        SessionSettings::Photo(still) => photo_args(&config.mode_script, still),
        SessionSettings::Video(video) => video_args(&config.mode_script, video, platform),
    };
    (config.interpreter.clone(), args)
}

/// Device and format after the platform remap
fn platform_source<'a>(video: &'a VideoSettings, platform: Platform) -> (&'a str, &'a str) {
    if platform.ubuntu && video.device == UBUNTU_NAMED_CAMERA {
        (UBUNTU_CAMERA_PATH, UBUNTU_CAMERA_FORMAT)
    } else {
        (video.device.as_str(), video.format.as_str())
    }
}

fn stream_args(script: &str, stream: &StreamSettings, platform: Platform) -> Vec<String> {
    let video = &stream.video;
    let (device, format) = platform_source(video, platform);
    let udp = match stream.transport {
        Transport::Rtsp => "0".to_string(),
        Transport::Udp { host, port } => format!("{}:{}", host, port),
    };

    let mut args = vec![
        script.to_string(),
        format!("--video={}", device),
        format!("--height={}", video.height),
        format!("--width={}", video.width),
        format!("--format={}", format),
        format!("--bitrate={}", video.bitrate),
        format!("--rotation={}", video.rotation),
        format!("--fps={}", video.fps),
        format!("--udp={}", udp),
        format!("--compression={}", video.compression.as_str()),
    ];
    if video.timestamp {
        args.push("--timestamp".to_string());
    }
    args
}

fn photo_args(script: &str, still: &StillSettings) -> Vec<String> {
    vec![
        script.to_string(),
        "--mode=photo".to_string(),
        format!("--device={}", still.device),
        format!("--width={}", still.width),
        format!("--height={}", still.height),
        format!("--format={}", still.format),
    ]
}

fn video_args(script: &str, video: &VideoSettings, platform: Platform) -> Vec<String> {
    let (device, format) = platform_source(video, platform);
    let mut args = vec![
        script.to_string(),
        "--mode=video".to_string(),
        format!("--device={}", device),
        format!("--width={}", video.width),
        format!("--height={}", video.height),
        format!("--format={}", format),
        format!("--bitrate={}", video.bitrate),
        format!("--rotation={}", video.rotation),
        format!("--fps={}", video.fps),
        format!("--compression={}", video.compression.as_str()),
    ];
    if video.timestamp {
        args.push("--timestamp".to_string());
    }
    args
}
