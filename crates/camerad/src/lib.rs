//! Companion Camera Daemon
//!
//! Wires the capture backends, the configuration store and the camera
//! service together, and logs everything the camera reports.

pub mod config;

use anyhow::Context;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use camera_capture::{CapabilityProber, CommandProber, HostInfo, ProcessSupervisor, SystemHost};
use camera_manager::{CameraDeps, CameraEvent, CameraService};
use storage::JsonFileStore;

pub use crate::config::{CaptureConfig, DaemonConfig};

/// Initialize logging
///
/// `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

/// Probe both catalogs once, reporting failures inline
pub async fn probe_catalogs(capture: &CaptureConfig) -> Value {
    let prober = CommandProber::new(capture.probe_config());
    let video = match prober.probe_video_devices().await {
        Ok(devices) => json!(devices),
        Err(e) => json!({ "error": e.to_string() }),
    };
    let still = match prober.probe_still_devices().await {
        Ok(devices) => json!(devices),
        Err(e) => json!({ "error": e.to_string() }),
    };
    json!({ "video": video, "still": still })
}

fn log_event(event: &CameraEvent) {
    match event {
        CameraEvent::Outbound(message) => debug!("Outbound {}: {:?}", message.name(), message),
        CameraEvent::ConfigurationDiscarded { mode, device, reason } => warn!(
            "Saved {} configuration for {} discarded: {}",
            mode,
            device.as_deref().unwrap_or("unknown device"),
            reason
        ),
        CameraEvent::SessionStarted {
            session,
            mode,
            device,
            addresses,
        } => {
            info!("Session {} started: {} on {}", session, mode, device);
            for address in addresses {
                info!("Stream available at {}", address);
            }
        }
        CameraEvent::SessionEnded {
            session,
            mode,
            crash: Some(crash),
        } => error!("Session {} ({}) ended: {}", session, mode, crash),
        CameraEvent::SessionEnded { session, mode, .. } => info!("Session {} ({}) ended", session, mode),
        CameraEvent::RecordingToggled { recording } => info!("Recording: {}", recording),
    }
}

/// Run the daemon until Ctrl-C
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let store = JsonFileStore::open(&config.settings_path)
        .with_context(|| format!("opening {}", config.settings_path.display()))?;
    let host: Arc<dyn HostInfo> = Arc::new(SystemHost);
    if let Some(distribution) = host.distribution() {
        info!("Host: {}", distribution);
    }

    let deps = CameraDeps {
        prober: Arc::new(CommandProber::new(config.capture.probe_config())),
        supervisor: Arc::new(ProcessSupervisor::new(config.capture.launch_config(), host.clone())),
        store: Arc::new(store),
        host,
    };

    let (handle, mut events, service) = CameraService::spawn(deps, config.service_config());
    let events_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let mut status = handle.subscribe();
    let mut last = status.borrow().clone();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    warn!("Camera service ended unexpectedly");
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                if snapshot != last {
                    info!(
                        "Camera {} in {} mode (device {:?})",
                        if snapshot.active { "active" } else { "idle" },
                        snapshot.mode,
                        snapshot.device
                    );
                    last = snapshot;
                }
            }
        }
    }

    info!("Shutting down camera");
    if let Err(e) = handle.shutdown().await {
        warn!("Camera service already stopped: {}", e);
    }
    drop(handle);
    service.await.context("camera service task")?;
    events_task.await.context("event logger task")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_reports_tool_failures_inline() {
        let capture = CaptureConfig {
            interpreter: "/nonexistent/python3".to_string(),
            v4l2_ctl: "/nonexistent/v4l2-ctl".to_string(),
            ..CaptureConfig::default()
        };
        let catalogs = probe_catalogs(&capture).await;
        assert!(catalogs["video"]["error"].is_string());
        assert!(catalogs["still"]["error"].is_string());
    }
}
