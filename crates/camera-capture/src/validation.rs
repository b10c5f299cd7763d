//! Settings validation against a probed catalog
//!
//! The same check runs when a session is requested and when saved
//! configuration is resumed at startup.

use crate::error::ValidationError;
use crate::types::{CaptureDevice, DeviceCapability, SessionSettings, Transport, VideoSettings};

/// Bitrate bounds (kbit/s)
pub const BITRATE_RANGE: std::ops::RangeInclusive<u32> = 50..=50_000;
/// Highest accepted frame-rate
pub const MAX_FPS: u32 = 120;
/// Accepted rotations (degrees)
pub const ROTATIONS: [u16; 4] = [0, 90, 180, 270];

/// The catalog entries a valid request resolved to
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub device: &'a CaptureDevice,
    pub capability: &'a DeviceCapability,
}

/// Check requested settings against a freshly probed catalog
pub fn validate_selection<'a>(
    catalog: &'a [CaptureDevice],
    settings: &SessionSettings,
) -> Result<Selection<'a>, ValidationError> {
    let device_id = settings.device_id();
    let device = catalog
        .iter()
        .find(|d| d.id == device_id)
        .ok_or_else(|| ValidationError::DeviceNotFound(device_id.to_string()))?;

    let (width, height) = settings.resolution();
    let format = settings.format();
    if width == 0 || height == 0 {
        return Err(ValidationError::InvalidSetting(format!(
            "resolution {}x{} must be non-zero",
            width, height
        )));
    }

    let capability = device
        .find_capability(width, height, format)
        .ok_or_else(|| ValidationError::CapabilityNotFound {
            device: device_id.to_string(),
            width,
            height,
            format: format.to_string(),
        })?;

    if let Some(video) = settings.video() {
        check_video(video, capability)?;
    }
    if let Some(stream) = settings.stream() {
        if let Transport::Udp { port: 0, .. } = stream.transport {
            return Err(ValidationError::InvalidSetting("UDP port must be non-zero".to_string()));
        }
    }

    Ok(Selection { device, capability })
}

fn check_video(video: &VideoSettings, cap: &DeviceCapability) -> Result<(), ValidationError> {
    if !ROTATIONS.contains(&video.rotation) {
        return Err(ValidationError::InvalidSetting(format!(
            "rotation {} not one of {:?}",
            video.rotation, ROTATIONS
        )));
    }
    if !BITRATE_RANGE.contains(&video.bitrate) {
        return Err(ValidationError::InvalidSetting(format!(
            "bitrate {} outside {:?} kbps",
            video.bitrate, BITRATE_RANGE
        )));
    }
    if video.fps > MAX_FPS {
        return Err(ValidationError::InvalidSetting(format!(
            "frame-rate {} above {}",
            video.fps, MAX_FPS
        )));
    }

    if cap.fps_max > 0 {
        if video.fps > cap.fps_max {
            return Err(ValidationError::InvalidSetting(format!(
                "frame-rate {} above capability maximum {}",
                video.fps, cap.fps_max
            )));
        }
    } else if !cap.fps.is_empty() && !cap.fps.iter().any(|f| f.value == video.fps) {
        return Err(ValidationError::InvalidSetting(format!(
            "frame-rate {} not offered by {}",
            video.fps, cap.label
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Compression, FrameRateOption, StillSettings, StreamSettings};

    fn catalog() -> Vec<CaptureDevice> {
        vec![CaptureDevice {
            id: "/dev/video0".to_string(),
            label: "USB Camera".to_string(),
            caps: vec![
                DeviceCapability {
                    width: 1920,
                    height: 1080,
                    format: "video/x-h264".to_string(),
                    label: "1080p".to_string(),
                    fps: vec![
                        FrameRateOption { value: 15, label: "15fps".to_string() },
                        FrameRateOption { value: 30, label: "30fps".to_string() },
                    ],
                    fps_max: 0,
                },
                DeviceCapability {
                    width: 640,
                    height: 480,
                    format: "video/x-raw".to_string(),
                    label: "480p".to_string(),
                    fps: Vec::new(),
                    fps_max: 60,
                },
            ],
        }]
    }

    fn video(width: u32, height: u32, format: &str, fps: u32) -> VideoSettings {
        VideoSettings {
            device: "/dev/video0".to_string(),
            width,
            height,
            format: format.to_string(),
            bitrate: 1100,
            fps,
            rotation: 0,
            timestamp: false,
            compression: Compression::H264,
        }
    }

    #[test]
    fn test_valid_selection() {
        let catalog = catalog();
        let settings = SessionSettings::Video(video(1920, 1080, "video/x-h264", 30));
        let selection = validate_selection(&catalog, &settings).unwrap();
        assert_eq!(selection.device.id, "/dev/video0");
        assert_eq!(selection.capability.label, "1080p");
    }

    #[test]
    fn test_unknown_device() {
        let catalog = catalog();
        let mut v = video(1920, 1080, "video/x-h264", 30);
        v.device = "/dev/video7".to_string();
        assert_eq!(
            validate_selection(&catalog, &SessionSettings::Video(v)).unwrap_err(),
            ValidationError::DeviceNotFound("/dev/video7".to_string())
        );
    }

    #[test]
    fn test_unknown_capability() {
        let catalog = catalog();
        let settings = SessionSettings::Photo(StillSettings {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            format: "video/x-h264".to_string(),
        });
        assert!(matches!(
            validate_selection(&catalog, &settings),
            Err(ValidationError::CapabilityNotFound { width: 1280, .. })
        ));
    }

    #[test]
    fn test_frame_rate_rules() {
        let catalog = catalog();
        let listed = SessionSettings::Video(video(1920, 1080, "video/x-h264", 25));
        assert!(matches!(
            validate_selection(&catalog, &listed),
            Err(ValidationError::InvalidSetting(_))
        ));

        let capped = SessionSettings::Video(video(640, 480, "video/x-raw", 61));
        assert!(matches!(
            validate_selection(&catalog, &capped),
            Err(ValidationError::InvalidSetting(_))
        ));

        let within = SessionSettings::Video(video(640, 480, "video/x-raw", 60));
        assert!(validate_selection(&catalog, &within).is_ok());
    }

    #[test]
    fn test_rotation_and_bitrate() {
        let catalog = catalog();
        let mut v = video(640, 480, "video/x-raw", 30);
        v.rotation = 45;
        assert!(validate_selection(&catalog, &SessionSettings::Video(v.clone())).is_err());

        v.rotation = 270;
        v.bitrate = 10;
        assert!(validate_selection(&catalog, &SessionSettings::Video(v)).is_err());
    }

    #[test]
    fn test_udp_port_zero_rejected() {
        let catalog = catalog();
        let settings = SessionSettings::Streaming(StreamSettings {
            video: video(640, 480, "video/x-raw", 30),
            transport: Transport::Udp {
                host: "192.168.1.10".parse().unwrap(),
                port: 0,
            },
            advertised_ip: "192.168.1.2".parse().unwrap(),
        });
        assert!(matches!(
            validate_selection(&catalog, &settings),
            Err(ValidationError::InvalidSetting(_))
        ));
    }
}
