//! In-crate fakes for manager and service tests

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, watch};

use camera_capture::{
    CapabilityProber, CaptureDevice, CaptureSupervisor, CatalogKind, Compression, DeviceCapability,
    FrameRateOption, HostInfo, LaunchError, ProbeError, ProcessExit, ProcessHandle, SessionId,
    SessionSettings, StillSettings, StreamSettings, Transport, VideoSettings,
};
use storage::MemoryStore;

use crate::manager::CameraDeps;

pub const FAKE_PID: u32 = 4242;

pub fn video_catalog() -> Vec<CaptureDevice> {
    vec![CaptureDevice {
        id: "/dev/video0".to_string(),
        label: "USB Camera".to_string(),
        caps: vec![
            DeviceCapability {
                width: 1920,
                height: 1080,
                format: "video/x-h264".to_string(),
                label: "1920x1080 H264".to_string(),
                fps: vec![FrameRateOption {
                    value: 30,
                    label: "30 fps".to_string(),
                }],
                fps_max: 0,
            },
            DeviceCapability {
                width: 1280,
                height: 720,
                format: "video/x-raw".to_string(),
                label: "1280x720 raw".to_string(),
                fps: Vec::new(),
                fps_max: 60,
            },
        ],
    }]
}

pub fn still_catalog() -> Vec<CaptureDevice> {
    vec![CaptureDevice {
        id: "/dev/v4l-subdev0".to_string(),
        label: "Still camera (/dev/v4l-subdev0)".to_string(),
        caps: vec![DeviceCapability {
            width: 4608,
            height: 2592,
            format: "SRGGB10_1X10".to_string(),
            label: "4608x2592 SRGGB10_1X10".to_string(),
            fps: Vec::new(),
            fps_max: 0,
        }],
    }]
}

pub fn video_settings() -> VideoSettings {
    VideoSettings {
        device: "/dev/video0".to_string(),
        width: 1920,
        height: 1080,
        format: "video/x-h264".to_string(),
        bitrate: 1100,
        fps: 30,
        rotation: 0,
        timestamp: false,
        compression: Compression::H264,
    }
}

pub fn streaming() -> SessionSettings {
    SessionSettings::Streaming(StreamSettings {
        video: video_settings(),
        transport: Transport::Rtsp,
        advertised_ip: "192.168.1.10".parse().unwrap(),
    })
}

pub fn recording() -> SessionSettings {
    SessionSettings::Video(video_settings())
}

pub fn photo() -> SessionSettings {
    SessionSettings::Photo(StillSettings {
        device: "/dev/v4l-subdev0".to_string(),
        width: 4608,
        height: 2592,
        format: "SRGGB10_1X10".to_string(),
    })
}

pub struct FakeProber {
    pub video: Mutex<Result<Vec<CaptureDevice>, ProbeError>>,
    pub still: Mutex<Result<Vec<CaptureDevice>, ProbeError>>,
    pub calls: AtomicUsize,
}

impl Default for FakeProber {
    fn default() -> Self {
        Self {
            video: Mutex::new(Ok(video_catalog())),
            still: Mutex::new(Ok(still_catalog())),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CapabilityProber for FakeProber {
    async fn probe_video_devices(&self) -> Result<Vec<CaptureDevice>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.video.lock().unwrap().clone()
    }

    async fn probe_still_devices(&self) -> Result<Vec<CaptureDevice>, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.still.lock().unwrap().clone()
    }
}

impl FakeProber {
    pub fn set_empty(&self, kind: CatalogKind) {
        let slot = match kind {
            CatalogKind::Video => &self.video,
            CatalogKind::Still => &self.still,
        };
        *slot.lock().unwrap() = Err(ProbeError::NoDevicesFound(kind));
    }
}

/// Supervisor that records calls and reports exits like the real one
#[derive(Default)]
pub struct FakeSupervisor {
    pub launches: Mutex<Vec<(SessionId, SessionSettings)>>,
    pub terminated: Mutex<Vec<SessionId>>,
    pub signals: AtomicUsize,
    pub fail_launch: AtomicBool,
    alive: Mutex<Vec<watch::Sender<bool>>>,
    exits: Mutex<Option<mpsc::Sender<ProcessExit>>>,
}

impl FakeSupervisor {
    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    pub fn signal_count(&self) -> usize {
        self.signals.load(Ordering::SeqCst)
    }

    /// Report the most recent session as exited with `code`
    pub fn crash_last(&self, code: i32) {
        let last = self.launches.lock().unwrap().last().cloned();
        let exits = self.exits.lock().unwrap().clone();
        if let (Some((session, settings)), Some(exits)) = (last, exits) {
            let _ = exits.try_send(ProcessExit {
                session,
                mode: settings.mode(),
                code: Some(code),
                signal: None,
            });
        }
    }
}

#[async_trait]
impl CaptureSupervisor for FakeSupervisor {
    async fn launch(
        &self,
        session: SessionId,
        settings: &SessionSettings,
        exits: mpsc::Sender<ProcessExit>,
    ) -> Result<ProcessHandle, LaunchError> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(LaunchError::SpawnFailure("python3: not found".to_string()));
        }
        self.launches.lock().unwrap().push((session, settings.clone()));
        *self.exits.lock().unwrap() = Some(exits);

        let (stop, _) = oneshot::channel();
        let (alive, alive_rx) = watch::channel(true);
        self.alive.lock().unwrap().push(alive);
        Ok(ProcessHandle::new(session, settings.mode(), Some(FAKE_PID), stop, alive_rx))
    }

    async fn terminate(&self, handle: ProcessHandle) {
        self.terminated.lock().unwrap().push(handle.session());
        let exits = self.exits.lock().unwrap().clone();
        if let Some(exits) = exits {
            let _ = exits.try_send(ProcessExit {
                session: handle.session(),
                mode: handle.mode(),
                code: None,
                signal: Some(15),
            });
        }
    }

    fn signal(&self, _handle: &ProcessHandle) -> Result<(), LaunchError> {
        self.signals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FixedHost;

impl HostInfo for FixedHost {
    fn distribution(&self) -> Option<String> {
        Some("Raspbian GNU/Linux 11 (bullseye)".to_string())
    }

    fn ipv4_addresses(&self) -> Vec<Ipv4Addr> {
        vec![Ipv4Addr::new(192, 168, 1, 10), Ipv4Addr::new(10, 0, 0, 5)]
    }
}

pub struct Fakes {
    pub prober: Arc<FakeProber>,
    pub supervisor: Arc<FakeSupervisor>,
    pub store: Arc<MemoryStore>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            prober: Arc::new(FakeProber::default()),
            supervisor: Arc::new(FakeSupervisor::default()),
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn deps(&self) -> CameraDeps {
        CameraDeps {
            prober: self.prober.clone(),
            supervisor: self.supervisor.clone(),
            store: self.store.clone(),
            host: Arc::new(FixedHost),
        }
    }
}
