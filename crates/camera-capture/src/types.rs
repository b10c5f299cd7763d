//! Capture device catalog and session settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// Capture mode. At most one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    /// Live video stream (RTSP server or UDP push)
    #[default]
    Streaming,
    /// Still photo capture on trigger
    Photo,
    /// Local video recording, toggled on demand
    Video,
}

impl CameraMode {
    /// Lowercase mode name
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraMode::Streaming => "streaming",
            CameraMode::Photo => "photo",
            CameraMode::Video => "video",
        }
    }

    /// Which device catalog serves this mode
    pub fn catalog(&self) -> CatalogKind {
        match self {
            CameraMode::Photo => CatalogKind::Still,
            CameraMode::Streaming | CameraMode::Video => CatalogKind::Video,
        }
    }
}

impl fmt::Display for CameraMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streaming" => Ok(CameraMode::Streaming),
            "photo" => Ok(CameraMode::Photo),
            "video" => Ok(CameraMode::Video),
            other => Err(format!("Unsupported camera mode: {}", other)),
        }
    }
}

/// Device catalog family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Video,
    Still,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::Video => f.write_str("video"),
            CatalogKind::Still => f.write_str("still"),
        }
    }
}

/// One selectable frame-rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRateOption {
    pub value: u32,
    pub label: String,
}

/// One (width, height, format) triple a device can produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapability {
    pub width: u32,
    pub height: u32,
    /// Pixel/stream format, e.g. `video/x-h264` or `SRGGB10_1X10`
    pub format: String,
    /// Display label
    pub label: String,
    /// Selectable frame-rates (used when `fps_max == 0`)
    #[serde(default)]
    pub fps: Vec<FrameRateOption>,
    /// Frame-rate cap; 0 means choose from `fps`
    #[serde(default)]
    pub fps_max: u32,
}

impl DeviceCapability {
    /// Check the resolution/format triple
    pub fn matches(&self, width: u32, height: u32, format: &str) -> bool {
        self.width == width && self.height == height && self.format == format
    }

    /// Frame-rate preselected for this capability
    pub fn default_frame_rate(&self) -> u32 {
        if self.fps_max == 0 {
            self.fps.first().map(|f| f.value).unwrap_or(0)
        } else {
            self.fps_max
        }
    }
}

/// A capture device and its capabilities, as seen by one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDevice {
    /// Device identity (path or named camera)
    pub id: String,
    /// Human readable name
    pub label: String,
    pub caps: Vec<DeviceCapability>,
}

impl CaptureDevice {
    /// Look up a capability by resolution and format
    pub fn find_capability(&self, width: u32, height: u32, format: &str) -> Option<&DeviceCapability> {
        self.caps.iter().find(|c| c.matches(width, height, format))
    }
}

/// Stream compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    H264,
    H265,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::H264 => "H264",
            Compression::H265 => "H265",
        }
    }
}

/// Stream delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Transport {
    /// Clients pull from the local RTSP server
    #[default]
    Rtsp,
    /// RTP pushed to a fixed destination
    Udp { host: IpAddr, port: u16 },
}

/// Pipeline settings shared by streaming and local recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    /// Encoder bitrate (kbit/s)
    pub bitrate: u32,
    pub fps: u32,
    /// Degrees: 0, 90, 180 or 270
    pub rotation: u16,
    /// Burn a timestamp into the frames
    #[serde(default)]
    pub timestamp: bool,
    #[serde(default)]
    pub compression: Compression,
}

/// Streaming settings: pipeline plus delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(flatten)]
    pub video: VideoSettings,
    pub transport: Transport,
    /// Address advertised to the ground station in stream information
    pub advertised_ip: IpAddr,
}

impl StreamSettings {
    /// GStreamer receive pipeline for UDP delivery
    pub fn receiver_pipeline(&self) -> Option<String> {
        let Transport::Udp { host, port } = self.transport else {
            return None;
        };

        let multicast = if host.is_multicast() {
            format!("multicast-group={} ", host)
        } else {
            String::new()
        };
        let codec = match self.video.compression {
            Compression::H264 => "264",
            Compression::H265 => "265",
        };

        Some(format!(
            "gst-launch-1.0 udpsrc {multicast}port={port} caps='application/x-rtp, media=(string)video, \
             clock-rate=(int)90000, encoding-name=(string)H{codec}' ! rtpjitterbuffer ! rtph{codec}depay ! \
             h{codec}parse ! avdec_h{codec} ! videoconvert ! autovideosink sync=false"
        ))
    }
}

/// Still capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StillSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// Settings for one session, keyed by mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "settings", rename_all = "lowercase")]
pub enum SessionSettings {
    Streaming(StreamSettings),
    Photo(StillSettings),
    Video(VideoSettings),
}

impl SessionSettings {
    pub fn mode(&self) -> CameraMode {
        match self {
            SessionSettings::Streaming(_) => CameraMode::Streaming,
            SessionSettings::Photo(_) => CameraMode::Photo,
            SessionSettings::Video(_) => CameraMode::Video,
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            SessionSettings::Streaming(s) => &s.video.device,
            SessionSettings::Photo(s) => &s.device,
            SessionSettings::Video(v) => &v.device,
        }
    }

    /// (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            SessionSettings::Streaming(s) => (s.video.width, s.video.height),
            SessionSettings::Photo(s) => (s.width, s.height),
            SessionSettings::Video(v) => (v.width, v.height),
        }
    }

    pub fn format(&self) -> &str {
        match self {
            SessionSettings::Streaming(s) => &s.video.format,
            SessionSettings::Photo(s) => &s.format,
            SessionSettings::Video(v) => &v.format,
        }
    }

    /// Pipeline settings, for streaming and video modes
    pub fn video(&self) -> Option<&VideoSettings> {
        match self {
            SessionSettings::Streaming(s) => Some(&s.video),
            SessionSettings::Video(v) => Some(v),
            SessionSettings::Photo(_) => None,
        }
    }

    pub fn stream(&self) -> Option<&StreamSettings> {
        match self {
            SessionSettings::Streaming(s) => Some(s),
            _ => None,
        }
    }
}

impl VideoSettings {
    /// Settings template preselected from a device's first capability
    pub fn template(device: &CaptureDevice) -> Option<Self> {
        let cap = device.caps.first()?;
        Some(Self {
            device: device.id.clone(),
            width: cap.width,
            height: cap.height,
            format: cap.format.clone(),
            bitrate: 1100,
            fps: cap.default_frame_rate(),
            rotation: 0,
            timestamp: false,
            compression: Compression::H264,
        })
    }
}

impl StreamSettings {
    /// Streaming template: RTSP delivery, UDP fields prefilled for the form
    pub fn template(device: &CaptureDevice) -> Option<Self> {
        Some(Self {
            video: VideoSettings::template(device)?,
            transport: Transport::Rtsp,
            advertised_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        })
    }

    /// Default UDP destination offered to the operator
    pub fn default_udp() -> Transport {
        Transport::Udp {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stream(transport: Transport) -> StreamSettings {
        StreamSettings {
            video: VideoSettings {
                device: "/dev/video0".to_string(),
                width: 1920,
                height: 1080,
                format: "video/x-h264".to_string(),
                bitrate: 2000,
                fps: 30,
                rotation: 0,
                timestamp: false,
                compression: Compression::H265,
            },
            transport,
            advertised_ip: "10.0.0.2".parse().unwrap(),
        }
    }

    #[test]
    fn test_mode_round_trip_from_str() {
        for mode in [CameraMode::Streaming, CameraMode::Photo, CameraMode::Video] {
            assert_eq!(mode.as_str().parse::<CameraMode>().unwrap(), mode);
        }
        assert!("timelapse".parse::<CameraMode>().is_err());
    }

    #[test]
    fn test_mode_catalog() {
        assert_eq!(CameraMode::Photo.catalog(), CatalogKind::Still);
        assert_eq!(CameraMode::Video.catalog(), CatalogKind::Video);
        assert_eq!(CameraMode::Streaming.catalog(), CatalogKind::Video);
    }

    #[test]
    fn test_default_frame_rate() {
        let mut cap = DeviceCapability {
            width: 640,
            height: 480,
            format: "video/x-raw".to_string(),
            label: "640x480".to_string(),
            fps: vec![
                FrameRateOption { value: 15, label: "15fps".to_string() },
                FrameRateOption { value: 30, label: "30fps".to_string() },
            ],
            fps_max: 0,
        };
        assert_eq!(cap.default_frame_rate(), 15);

        cap.fps_max = 90;
        assert_eq!(cap.default_frame_rate(), 90);
    }

    #[test]
    fn test_session_settings_tagged_by_mode() {
        let settings = SessionSettings::Streaming(sample_stream(Transport::Rtsp));
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["mode"], "streaming");
        assert_eq!(json["settings"]["device"], "/dev/video0");
        assert_eq!(json["settings"]["transport"]["kind"], "rtsp");

        let back: SessionSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
        assert_eq!(back.mode(), CameraMode::Streaming);
    }

    #[test]
    fn test_receiver_pipeline_multicast() {
        let stream = sample_stream(Transport::Udp {
            host: "239.1.1.1".parse().unwrap(),
            port: 5600,
        });
        let pipeline = stream.receiver_pipeline().unwrap();
        assert!(pipeline.contains("multicast-group=239.1.1.1 port=5600"));
        assert!(pipeline.contains("rtph265depay"));

        let unicast = sample_stream(Transport::Udp {
            host: "192.168.1.20".parse().unwrap(),
            port: 5600,
        });
        assert!(!unicast.receiver_pipeline().unwrap().contains("multicast-group"));
        assert!(sample_stream(Transport::Rtsp).receiver_pipeline().is_none());
    }
}
