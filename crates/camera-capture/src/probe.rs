//! Capability discovery
//!
//! Video devices come from a discovery script printing a JSON catalog.
//! Still sensors are enumerated directly with `v4l2-ctl` sub-device queries.
//! Nothing is cached: every call runs the tools again.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ProbeError;
use crate::types::{CaptureDevice, CatalogKind, DeviceCapability, FrameRateOption};

/// Stderr fragments the multimedia stack prints on healthy runs
pub const DEFAULT_BENIGN_WARNINGS: &[&str] = &[
    "DeprecationWarning",
    "gst_element_message_full_with_details",
    "camera_manager.cpp",
    "Unsupported V4L2 pixel format",
];

/// Source of device catalogs
#[async_trait]
pub trait CapabilityProber: Send + Sync {
    /// Enumerate video devices and their capabilities
    async fn probe_video_devices(&self) -> Result<Vec<CaptureDevice>, ProbeError>;

    /// Enumerate still capture devices and their capabilities
    async fn probe_still_devices(&self) -> Result<Vec<CaptureDevice>, ProbeError>;

    /// Probe the catalog of the given family
    async fn probe(&self, kind: CatalogKind) -> Result<Vec<CaptureDevice>, ProbeError> {
        match kind {
            CatalogKind::Video => self.probe_video_devices().await,
            CatalogKind::Still => self.probe_still_devices().await,
        }
    }
}

/// Discovery tool configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Interpreter for the discovery script
    pub interpreter: String,
    /// Video discovery script
    pub video_script: String,
    /// `v4l2-ctl` binary
    pub v4l2_ctl: String,
    /// Sub-device of the still sensor
    pub still_device: String,
    /// Stderr fragments that do not indicate failure
    pub benign_warnings: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            video_script: "./python/gstcaps.py".to_string(),
            v4l2_ctl: "v4l2-ctl".to_string(),
            still_device: "/dev/v4l-subdev0".to_string(),
            benign_warnings: DEFAULT_BENIGN_WARNINGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Prober backed by external tools
pub struct CommandProber {
    config: ProbeConfig,
}

impl CommandProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Run a tool and return its stdout, applying the stderr allow-list
    async fn run_tool(&self, program: &str, args: &[String]) -> Result<String, ProbeError> {
        debug!("Running discovery tool: {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| ProbeError::ToolFailure {
                tool: program.to_string(),
                message: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(ProbeError::ToolFailure {
                tool: program.to_string(),
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }
        if let Some(line) = first_fatal_line(&stderr, &self.config.benign_warnings) {
            return Err(ProbeError::ToolFailure {
                tool: program.to_string(),
                message: line.to_string(),
            });
        }
        if !stderr.trim().is_empty() {
            debug!("Ignoring benign discovery warnings from {}", program);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl CapabilityProber for CommandProber {
    async fn probe_video_devices(&self) -> Result<Vec<CaptureDevice>, ProbeError> {
        let args = vec![self.config.video_script.clone()];
        let stdout = self.run_tool(&self.config.interpreter, &args).await?;
        let devices = parse_video_catalog(&stdout)?;
        if devices.is_empty() {
            return Err(ProbeError::NoDevicesFound(CatalogKind::Video));
        }
        info!("Found {} video devices", devices.len());
        Ok(devices)
    }

    async fn probe_still_devices(&self) -> Result<Vec<CaptureDevice>, ProbeError> {
        let dev = &self.config.still_device;
        let codes_args = vec![
            "-d".to_string(),
            dev.clone(),
            "--list-subdev-mbus-codes".to_string(),
            "0".to_string(),
        ];
        let codes = parse_mbus_codes(&self.run_tool(&self.config.v4l2_ctl, &codes_args).await?);

        let mut caps = Vec::new();
        for (code, pixel_format) in codes {
            let size_args = vec![
                "-d".to_string(),
                dev.clone(),
                "--list-subdev-framesizes".to_string(),
                format!("pad=0,code=0x{}", code),
            ];
            let sizes = match self.run_tool(&self.config.v4l2_ctl, &size_args).await {
                Ok(out) => parse_frame_sizes(&out),
                Err(e) => {
                    warn!("Skipping media bus code 0x{}: {}", code, e);
                    continue;
                }
            };
            caps.extend(still_capabilities(&pixel_format, &sizes));
        }

        if caps.is_empty() {
            return Err(ProbeError::NoDevicesFound(CatalogKind::Still));
        }

        info!("Found {} still capabilities on {}", caps.len(), dev);
        Ok(vec![CaptureDevice {
            id: dev.clone(),
            label: format!("Still camera ({})", dev),
            caps,
        }])
    }
}

/// First stderr line not covered by the allow-list
fn first_fatal_line<'a>(stderr: &'a str, benign: &[String]) -> Option<&'a str> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| !benign.iter().any(|w| line.contains(w.as_str())))
}

#[derive(Deserialize)]
struct RawDevice {
    value: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    caps: Vec<RawCapability>,
}

#[derive(Deserialize)]
struct RawCapability {
    #[serde(default)]
    value: String,
    #[serde(default)]
    label: String,
    width: u32,
    height: u32,
    #[serde(default)]
    format: String,
    #[serde(default)]
    fps: Vec<RawFrameRate>,
    #[serde(default)]
    fpsmax: u32,
}

#[derive(Deserialize)]
struct RawFrameRate {
    value: Value,
    #[serde(default)]
    label: Option<String>,
}

/// Parse the discovery script's JSON device list
pub fn parse_video_catalog(stdout: &str) -> Result<Vec<CaptureDevice>, ProbeError> {
    let raw: Vec<RawDevice> =
        serde_json::from_str(stdout.trim()).map_err(|e| ProbeError::ParseFailure(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|d| CaptureDevice {
            label: if d.label.is_empty() { d.value.clone() } else { d.label },
            id: d.value,
            caps: d.caps.into_iter().map(convert_capability).collect(),
        })
        .collect())
}

fn convert_capability(raw: RawCapability) -> DeviceCapability {
    // Caps keyed "WxHxfmt" may omit the explicit format field
    let format = if raw.format.is_empty() {
        raw.value.splitn(3, 'x').nth(2).unwrap_or_default().to_string()
    } else {
        raw.format
    };

    let fps = raw
        .fps
        .into_iter()
        .filter_map(|f| {
            let value = match &f.value {
                Value::Number(n) => n.as_u64().map(|v| v as u32),
                Value::String(s) => s.trim().parse::<u32>().ok(),
                _ => None,
            }?;
            Some(FrameRateOption {
                value,
                label: f.label.unwrap_or_else(|| format!("{}fps", value)),
            })
        })
        .collect();

    DeviceCapability {
        label: if raw.label.is_empty() {
            format!("{}x{}", raw.width, raw.height)
        } else {
            raw.label
        },
        width: raw.width,
        height: raw.height,
        format,
        fps,
        fps_max: raw.fpsmax,
    }
}

/// Parse `--list-subdev-mbus-codes` output into (hex code, format name) pairs
pub fn parse_mbus_codes(stdout: &str) -> Vec<(String, String)> {
    let mut codes = Vec::new();
    for line in stdout.lines() {
        let Some(start) = line.find("0x") else {
            continue;
        };
        let tail = &line[start + 2..];
        let Some(colon) = tail.find(':') else {
            continue;
        };
        let code = &tail[..colon];
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        let name: String = tail[colon + 1..]
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !name.is_empty() {
            codes.push((code.to_string(), name));
        }
    }
    codes
}

/// Parse `--list-subdev-framesizes` output into (width, height) pairs
pub fn parse_frame_sizes(stdout: &str) -> Vec<(u32, u32)> {
    const MARKER: &str = "Size Range: ";

    stdout
        .lines()
        .filter_map(|line| {
            let start = line.find(MARKER)? + MARKER.len();
            let size: String = line[start..]
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == 'x')
                .collect();
            let (w, h) = size.split_once('x')?;
            Some((w.parse().ok()?, h.parse().ok()?))
        })
        .collect()
}

fn still_capabilities(pixel_format: &str, sizes: &[(u32, u32)]) -> Vec<DeviceCapability> {
    let short = pixel_format
        .split_once("MEDIA_BUS_FMT_")
        .map(|(_, rest)| rest)
        .unwrap_or(pixel_format);

    sizes
        .iter()
        .map(|&(width, height)| DeviceCapability {
            width,
            height,
            format: short.to_string(),
            label: format!("{}x{}_{}", width, height, short),
            fps: Vec::new(),
            fps_max: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GST_CATALOG: &str = r#"[
        {"value": "/dev/video0", "label": "USB Camera", "caps": [
            {"value": "1920x1080xh264", "label": "1920x1080 H.264", "width": 1920, "height": 1080,
             "format": "video/x-h264", "fps": [{"value": 30, "label": "30fps"}, {"value": "15", "label": "15fps"}],
             "fpsmax": 0},
            {"value": "640x480xraw", "label": "640x480", "width": 640, "height": 480, "fpsmax": 90}
        ]},
        {"value": "rpicam", "label": "Raspberry Pi Camera", "caps": []}
    ]"#;

    #[test]
    fn test_parse_video_catalog() {
        let devices = parse_video_catalog(GST_CATALOG).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "/dev/video0");

        let cap = &devices[0].caps[0];
        assert_eq!(cap.format, "video/x-h264");
        assert_eq!(cap.fps.iter().map(|f| f.value).collect::<Vec<_>>(), vec![30, 15]);

        let raw = &devices[0].caps[1];
        assert_eq!(raw.format, "raw");
        assert_eq!(raw.fps_max, 90);
        assert_eq!(devices[1].caps.len(), 0);
    }

    #[test]
    fn test_parse_video_catalog_rejects_garbage() {
        assert!(matches!(
            parse_video_catalog("Traceback (most recent call last):"),
            Err(ProbeError::ParseFailure(_))
        ));
    }

    #[test]
    fn test_parse_mbus_codes() {
        let out = "\tpad 0\n\t0x300f: MEDIA_BUS_FMT_SRGGB10_1X10\n\t0x3007: MEDIA_BUS_FMT_SRGGB8_1X8\nnoise line\n";
        let codes = parse_mbus_codes(out);
        assert_eq!(
            codes,
            vec![
                ("300f".to_string(), "MEDIA_BUS_FMT_SRGGB10_1X10".to_string()),
                ("3007".to_string(), "MEDIA_BUS_FMT_SRGGB8_1X8".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_frame_sizes() {
        let out = "\tSize Range: 4608x2592 - 4608x2592\n\tSize Range: 2304x1296 - 2304x1296\n";
        assert_eq!(parse_frame_sizes(out), vec![(4608, 2592), (2304, 1296)]);
    }

    #[test]
    fn test_still_capabilities_strip_prefix() {
        let caps = still_capabilities("MEDIA_BUS_FMT_SRGGB10_1X10", &[(4608, 2592)]);
        assert_eq!(caps[0].format, "SRGGB10_1X10");
        assert_eq!(caps[0].label, "4608x2592_SRGGB10_1X10");
    }

    #[test]
    fn test_benign_warnings_filtered() {
        let benign: Vec<String> = DEFAULT_BENIGN_WARNINGS.iter().map(|s| s.to_string()).collect();
        let stderr = "gstcaps.py:12: DeprecationWarning: old api\n[0:01] WARN camera_manager.cpp:1 x\n";
        assert_eq!(first_fatal_line(stderr, &benign), None);

        let stderr = "DeprecationWarning: fine\nSegmentation fault\n";
        assert_eq!(first_fatal_line(stderr, &benign), Some("Segmentation fault"));
    }

    #[tokio::test]
    async fn test_missing_tool_is_tool_failure() {
        let prober = CommandProber::new(ProbeConfig {
            interpreter: "/nonexistent/interpreter".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            prober.probe_video_devices().await,
            Err(ProbeError::ToolFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_no_devices() {
        let prober = CommandProber::new(ProbeConfig {
            interpreter: "echo".to_string(),
            video_script: "[]".to_string(),
            ..Default::default()
        });
        assert_eq!(
            prober.probe_video_devices().await,
            Err(ProbeError::NoDevicesFound(CatalogKind::Video))
        );
    }

    fn script_prober(body: &str) -> (CommandProber, tempfile::NamedTempFile) {
        use std::io::Write;

        let mut script = tempfile::NamedTempFile::new().unwrap();
        writeln!(script, "{}", body).unwrap();
        let prober = CommandProber::new(ProbeConfig {
            interpreter: "sh".to_string(),
            video_script: script.path().to_string_lossy().into_owned(),
            ..Default::default()
        });
        (prober, script)
    }

    #[tokio::test]
    async fn test_benign_stderr_does_not_fail_probe() {
        let (prober, _script) = script_prober(
            "echo 'gstcaps.py:3: DeprecationWarning: Gst.Element.get_pad' >&2\n\
             echo 'Unsupported V4L2 pixel format RPBP' >&2\n\
             echo '[{\"value\": \"/dev/video0\", \"label\": \"USB\", \"caps\": []}]'",
        );
        let devices = prober.probe_video_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "/dev/video0");
    }

    #[tokio::test]
    async fn test_unlisted_stderr_fails_probe() {
        let (prober, _script) = script_prober(
            "echo 'Failed to open /dev/video0' >&2\n\
             echo '[{\"value\": \"/dev/video0\", \"caps\": []}]'",
        );
        assert!(matches!(
            prober.probe_video_devices().await,
            Err(ProbeError::ToolFailure { ref message, .. }) if message == "Failed to open /dev/video0"
        ));
    }

    proptest! {
        #[test]
        fn prop_frame_sizes_parse_any_resolution(w in 1u32..10000, h in 1u32..10000) {
            let out = format!("\tSize Range: {}x{} - {}x{}\n", w, h, w, h);
            prop_assert_eq!(parse_frame_sizes(&out), vec![(w, h)]);
        }
    }
}
