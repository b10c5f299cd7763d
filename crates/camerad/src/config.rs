//! Daemon configuration
//!
//! Defaults, then an optional TOML file, then `CAMERAD_*` environment
//! variables (`__` separates nested keys, e.g. `CAMERAD_CAPTURE__RTSP_PORT`).

use camera_capture::probe::DEFAULT_BENIGN_WARNINGS;
use camera_capture::{LaunchConfig, ProbeConfig, DEFAULT_RTSP_PORT};
use camera_manager::{ManagerConfig, ServiceConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "camerad.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// JSON file holding the persisted camera configuration
    pub settings_path: PathBuf,
    /// Filter directive, e.g. `info` or `camera_manager=debug,info`
    pub log_level: String,
    pub log_json: bool,
    pub status_interval_ms: u64,
    pub event_buffer: usize,
    pub capture: CaptureConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("settings.json"),
            log_level: "info".to_string(),
            log_json: false,
            status_interval_ms: 1000,
            event_buffer: 64,
            capture: CaptureConfig::default(),
        }
    }
}

/// External tools and scripts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub interpreter: String,
    pub video_probe_script: String,
    pub v4l2_ctl: String,
    pub still_probe_device: String,
    pub stream_script: String,
    pub mode_script: String,
    pub rtsp_port: u16,
    /// Stderr fragments that do not fail a probe
    pub benign_warnings: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            video_probe_script: "./python/gstcaps.py".to_string(),
            v4l2_ctl: "v4l2-ctl".to_string(),
            still_probe_device: "/dev/v4l-subdev0".to_string(),
            stream_script: "./python/rtsp-server.py".to_string(),
            mode_script: "./python/photomode.py".to_string(),
            rtsp_port: DEFAULT_RTSP_PORT,
            benign_warnings: DEFAULT_BENIGN_WARNINGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration; `path` must exist when given
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("CAMERAD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            manager: ManagerConfig {
                rtsp_port: self.capture.rtsp_port,
            },
            status_interval: Duration::from_millis(self.status_interval_ms.max(1)),
            event_buffer: self.event_buffer,
        }
    }
}

impl CaptureConfig {
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            interpreter: self.interpreter.clone(),
            video_script: self.video_probe_script.clone(),
            v4l2_ctl: self.v4l2_ctl.clone(),
            still_device: self.still_probe_device.clone(),
            benign_warnings: self.benign_warnings.clone(),
        }
    }

    pub fn launch_config(&self) -> LaunchConfig {
        LaunchConfig {
            interpreter: self.interpreter.clone(),
            stream_script: self.stream_script.clone(),
            mode_script: self.mode_script.clone(),
        }
    }
}
