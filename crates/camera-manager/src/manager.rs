//! Camera Mode Manager
//!
//! Idle / Active(mode) state machine. Every transition goes through
//! `&mut self`, so the owner (see [`crate::CameraService`]) serializes them.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use camera_capture::host::stream_addresses;
use camera_capture::{
    validate_selection, CameraMode, CapabilityProber, CaptureDevice, CaptureSupervisor, CatalogKind,
    HostInfo, ProcessExit, ProcessHandle, SessionId, SessionSettings, StillSettings, StreamSettings,
    Transport, VideoSettings, DEFAULT_RTSP_PORT,
};
use camera_protocol::{
    CameraRequest, CameraTrigger, CommandResult, Heartbeat, InboundCommand, OutboundMessage, Route,
};
use storage::ConfigStore;

use crate::bridge;
use crate::error::CameraError;
use crate::events::{CameraEvent, EventSink};
use crate::persist;
use crate::state::{CameraState, DeviceCatalog, StartOutcome, SystemStatus};

/// Heartbeat period while a session runs with heartbeat enabled
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

/// Pending exit notifications; at most one process lives at a time
const EXIT_BUFFER: usize = 8;

/// Unsolicited messages go to every system and component
const BROADCAST: Route = Route {
    target_system: 0,
    target_component: 0,
};

/// Collaborators the manager drives
#[derive(Clone)]
pub struct CameraDeps {
    pub prober: Arc<dyn CapabilityProber>,
    pub supervisor: Arc<dyn CaptureSupervisor>,
    pub store: Arc<dyn ConfigStore>,
    pub host: Arc<dyn HostInfo>,
}

/// Manager configuration
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Port of the RTSP server the streaming pipeline runs
    pub rtsp_port: u16,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            rtsp_port: DEFAULT_RTSP_PORT,
        }
    }
}

/// Owner of the camera state
pub struct CameraManager {
    deps: CameraDeps,
    config: ManagerConfig,
    events: EventSink,
    exits: mpsc::Sender<ProcessExit>,
    state: CameraState,
    heartbeat: Option<Interval>,
    next_session: SessionId,
    /// Sequence number of the next still capture; spans sessions
    photo_seq: u32,
    started: Instant,
}

impl CameraManager {
    /// Create an idle manager
    ///
    /// Process exits arrive on the returned receiver and must be fed back
    /// through [`CameraManager::handle_exit`].
    pub fn new(deps: CameraDeps, config: ManagerConfig, events: EventSink) -> (Self, mpsc::Receiver<ProcessExit>) {
        let (exits, exit_rx) = mpsc::channel(EXIT_BUFFER);
        info!("Creating camera manager (RTSP port {})", config.rtsp_port);
        let manager = Self {
            deps,
            config,
            events,
            exits,
            state: CameraState::default(),
            heartbeat: None,
            next_session: 1,
            photo_seq: 0,
            started: Instant::now(),
        };
        (manager, exit_rx)
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn status(&self) -> SystemStatus {
        self.state.status()
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_some()
    }

    fn store(&self) -> &dyn ConfigStore {
        self.deps.store.as_ref()
    }

    /// Restore the saved configuration
    ///
    /// A saved active session is resumed only if its device and capability
    /// are still in a fresh probe. Otherwise the stored configuration is
    /// cleared and a [`CameraEvent::ConfigurationDiscarded`] is emitted.
    pub async fn initialize(&mut self) -> Result<(), CameraError> {
        let saved = persist::load(self.store());
        self.state.mode = saved.mode;
        self.state.use_heartbeat = saved.use_heartbeat;

        if !saved.active {
            info!("Camera idle at startup ({} mode)", saved.mode);
            return Ok(());
        }

        let Some(settings) = saved.settings else {
            return self.discard_saved(saved.mode, None, "no settings saved".to_string());
        };

        let mode = settings.mode();
        let catalog = match self.deps.prober.probe(mode.catalog()).await {
            Ok(catalog) => catalog,
            Err(e) => {
                let device = settings.device_id().to_string();
                return self.discard_saved(mode, Some(device), e.to_string());
            }
        };

        if let Err(e) = validate_selection(&catalog, &settings) {
            let device = settings.device_id().to_string();
            return self.discard_saved(mode, Some(device), e.to_string());
        }

        info!("Resuming {} session on {}", mode, settings.device_id());
        self.launch_session(settings).await.map(|_| ())
    }

    fn discard_saved(&mut self, mode: CameraMode, device: Option<String>, reason: String) -> Result<(), CameraError> {
        warn!(
            "Discarding saved {} configuration for {}: {}",
            mode,
            device.as_deref().unwrap_or("unknown device"),
            reason
        );
        self.state.reset();
        persist::clear_session(self.store())?;
        self.events
            .emit(CameraEvent::ConfigurationDiscarded { mode, device, reason });
        Ok(())
    }

    /// Start a capture session
    ///
    /// Only valid from Idle. The requested device and capability must be in a
    /// fresh probe of the mode's catalog; nothing is spawned otherwise.
    pub async fn start_camera(
        &mut self,
        settings: SessionSettings,
        use_heartbeat: bool,
    ) -> Result<StartOutcome, CameraError> {
        if self.state.active {
            warn!("Start requested while {} session is running", self.state.mode);
            return Err(CameraError::AlreadyActive(self.state.mode));
        }

        let mode = settings.mode();
        let catalog = self.deps.prober.probe(mode.catalog()).await.map_err(|e| {
            warn!("Cannot start {} on {}: {}", mode, settings.device_id(), e);
            e
        })?;

        if let Err(e) = validate_selection(&catalog, &settings) {
            warn!("Rejected {} settings for {}: {}", mode, settings.device_id(), e);
            return Err(e.into());
        }

        self.state.use_heartbeat = use_heartbeat;
        persist::set_use_heartbeat(self.store(), use_heartbeat)?;
        persist::save_session(self.store(), &settings)?;

        self.launch_session(settings).await
    }

    async fn launch_session(&mut self, settings: SessionSettings) -> Result<StartOutcome, CameraError> {
        let mode = settings.mode();
        let session = self.next_session;
        self.next_session += 1;

        let handle = match self
            .deps
            .supervisor
            .launch(session, &settings, self.exits.clone())
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to launch {} capture on {}: {}", mode, settings.device_id(), e);
                self.state.reset();
                if let Err(se) = persist::clear_session(self.store()) {
                    error!("Failed to clear saved configuration: {}", se);
                }
                return Err(e.into());
            }
        };

        let addresses = match &settings {
            SessionSettings::Streaming(stream) if stream.transport == Transport::Rtsp => stream_addresses(
                &self.deps.host.ipv4_addresses(),
                self.config.rtsp_port,
                &stream.video.device,
            ),
            _ => Vec::new(),
        };
        let receiver_pipeline = settings.stream().and_then(|s| s.receiver_pipeline());
        let device = settings.device_id().to_string();

        self.state.active = true;
        self.state.mode = mode;
        self.state.settings = Some(settings);
        self.state.process = Some(handle);
        self.state.stream_addresses = addresses.clone();
        self.state.recording = false;

        if let Err(e) = persist::set_active(self.store(), true) {
            error!("Failed to save active flag: {}", e);
        }

        info!("Camera active in {} mode on {} (session {})", mode, device, session);
        self.events.emit(CameraEvent::SessionStarted {
            session,
            mode,
            device,
            addresses: addresses.clone(),
        });

        if self.state.use_heartbeat {
            self.start_heartbeat();
        }

        Ok(StartOutcome {
            active: true,
            addresses,
            receiver_pipeline,
        })
    }

    /// Stop the running session; a no-op when idle
    ///
    /// The heartbeat is cancelled before this returns.
    pub async fn stop_camera(&mut self) -> Result<(), CameraError> {
        if !self.end_session().await {
            debug!("Stop requested while idle");
            return Ok(());
        }
        persist::clear_session(self.store())?;
        Ok(())
    }

    /// Terminate the capture process but keep the saved configuration, so
    /// the session resumes on next start
    pub async fn shutdown(&mut self) {
        if self.end_session().await {
            info!("Camera shut down, saved configuration kept");
        }
    }

    async fn end_session(&mut self) -> bool {
        self.stop_heartbeat();
        let was_active = self.state.active;
        let mode = self.state.mode;

        if let Some(handle) = self.state.reset() {
            let session = handle.session();
            self.deps.supervisor.terminate(handle).await;
            info!("Stopped {} session {}", mode, session);
            self.events.emit(CameraEvent::SessionEnded {
                session,
                mode,
                crash: None,
            });
        }
        was_active
    }

    /// React to a capture process ending
    ///
    /// Exits of sessions already torn down are ignored. Any other exit
    /// returns the camera to Idle and clears the saved configuration.
    pub fn handle_exit(&mut self, exit: ProcessExit) -> Result<(), CameraError> {
        let current = self.state.process.as_ref().map(ProcessHandle::session);
        if current != Some(exit.session) {
            debug!("Ignoring exit of finished session {}", exit.session);
            return Ok(());
        }

        self.stop_heartbeat();
        let device = self
            .state
            .settings
            .as_ref()
            .map(|s| s.device_id().to_string())
            .unwrap_or_default();

        let crash = if exit.success() {
            warn!("{} capture on {} exited on its own", exit.mode, device);
            None
        } else {
            let crash = exit.crash();
            error!("{} capture on {} failed: {}", exit.mode, device, crash);
            Some(crash)
        };

        self.state.reset();
        self.events.emit(CameraEvent::SessionEnded {
            session: exit.session,
            mode: exit.mode,
            crash,
        });
        persist::clear_session(self.store())?;
        Ok(())
    }

    fn session_process(&self, expected: CameraMode) -> Result<&ProcessHandle, CameraError> {
        if !self.state.active {
            return Err(CameraError::NotActive);
        }
        if self.state.mode != expected {
            return Err(CameraError::ModeMismatch {
                expected,
                actual: self.state.mode,
            });
        }
        self.state.process.as_ref().ok_or(CameraError::NoProcess)
    }

    fn take_photo(&mut self) -> Result<CameraTrigger, CameraError> {
        let handle = self.session_process(CameraMode::Photo)?;
        self.deps.supervisor.signal(handle)?;

        let trigger = CameraTrigger {
            time_usec: now_usec(),
            seq: self.photo_seq,
        };
        self.photo_seq = self.photo_seq.wrapping_add(1);
        info!("Captured photo {}", trigger.seq);
        Ok(trigger)
    }

    /// Capture a still photo now (photo mode only) and emit its trigger
    pub fn capture_still_photo(&mut self) -> Result<CameraTrigger, CameraError> {
        let trigger = self.take_photo().map_err(|e| {
            warn!("Photo capture rejected: {}", e);
            e
        })?;
        self.events.outbound(OutboundMessage::CameraTrigger(trigger));
        Ok(trigger)
    }

    /// Start or stop local recording (video mode only)
    pub fn toggle_video_recording(&mut self) -> Result<bool, CameraError> {
        let handle = self.session_process(CameraMode::Video).map_err(|e| {
            warn!("Recording toggle rejected: {}", e);
            e
        })?;
        self.deps.supervisor.signal(handle)?;

        self.state.recording = !self.state.recording;
        let recording = self.state.recording;
        info!("Recording {}", if recording { "started" } else { "stopped" });
        self.events.emit(CameraEvent::RecordingToggled { recording });
        Ok(recording)
    }

    pub async fn set_use_heartbeat(&mut self, enabled: bool) -> Result<(), CameraError> {
        self.state.use_heartbeat = enabled;
        persist::set_use_heartbeat(self.store(), enabled)?;
        if !self.state.active {
            return Ok(());
        }
        if enabled && self.heartbeat.is_none() {
            self.start_heartbeat();
        } else if !enabled {
            self.stop_heartbeat();
        }
        Ok(())
    }

    fn start_heartbeat(&mut self) {
        let mut interval = tokio::time::interval(HEARTBEAT_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.heartbeat = Some(interval);
        debug!("Heartbeat started");

        if let Some(stream) = self.state.settings.as_ref().and_then(SessionSettings::stream) {
            self.events.outbound(OutboundMessage::VideoStreamInformation {
                route: BROADCAST,
                info: bridge::stream_information(stream, self.config.rtsp_port),
            });
        }
    }

    fn stop_heartbeat(&mut self) {
        if self.heartbeat.take().is_some() {
            debug!("Heartbeat stopped");
        }
    }

    /// Resolves on the next heartbeat tick; never while the heartbeat is off
    pub async fn next_heartbeat(&mut self) {
        match self.heartbeat.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn emit_heartbeat(&self) {
        if self.state.active && self.heartbeat.is_some() {
            self.events.outbound(OutboundMessage::Heartbeat(Heartbeat::camera()));
        }
    }

    /// Dispatch one inbound command
    ///
    /// Nothing is sent while idle or for commands the camera does not handle.
    /// Dispatched commands are acknowledged before the reply.
    pub fn handle_command(&mut self, cmd: &InboundCommand) -> Option<CameraRequest> {
        if !self.state.active {
            debug!("Camera idle, ignoring command {}", cmd.command);
            return None;
        }
        let request = match CameraRequest::decode(cmd) {
            Ok(request) => request,
            Err(e) => {
                debug!("Not dispatched: {}", e);
                return None;
            }
        };
        let settings = self.state.settings.clone()?;
        let route = cmd.reply_route();
        let time_boot_ms = self.time_boot_ms();

        match request {
            CameraRequest::CameraInformation => {
                self.acknowledge(cmd, CommandResult::Accepted);
                self.events.outbound(OutboundMessage::CameraInformation {
                    route,
                    info: bridge::camera_information(&settings, time_boot_ms),
                });
            }
            CameraRequest::VideoStreamInformation => {
                let Some(stream) = settings.stream() else {
                    debug!("Stream information requested in {} mode", settings.mode());
                    return None;
                };
                self.acknowledge(cmd, CommandResult::Accepted);
                self.events.outbound(OutboundMessage::VideoStreamInformation {
                    route,
                    info: bridge::stream_information(stream, self.config.rtsp_port),
                });
            }
            CameraRequest::CameraSettings => {
                self.acknowledge(cmd, CommandResult::Accepted);
                self.events.outbound(OutboundMessage::CameraSettings {
                    route,
                    settings: bridge::camera_settings(&settings, time_boot_ms),
                });
            }
            CameraRequest::DigicamControl => match self.take_photo() {
                Ok(trigger) => {
                    self.acknowledge(cmd, CommandResult::Accepted);
                    self.events.outbound(OutboundMessage::CameraTrigger(trigger));
                }
                Err(e) => {
                    warn!("Digicam control rejected: {}", e);
                    self.acknowledge(cmd, CommandResult::Denied);
                }
            },
        }
        Some(request)
    }

    fn acknowledge(&self, cmd: &InboundCommand, result: CommandResult) {
        self.events
            .outbound(OutboundMessage::CommandAck(bridge::ack(cmd, result)));
    }

    fn time_boot_ms(&self) -> u32 {
        u32::try_from(self.started.elapsed().as_millis()).unwrap_or(u32::MAX)
    }

    /// Video catalog with the current or default selection
    pub async fn video_devices(&self) -> Result<DeviceCatalog, CameraError> {
        self.device_catalog(CatalogKind::Video).await
    }

    /// Still catalog with the current or default selection
    pub async fn still_devices(&self) -> Result<DeviceCatalog, CameraError> {
        self.device_catalog(CatalogKind::Still).await
    }

    async fn device_catalog(&self, kind: CatalogKind) -> Result<DeviceCatalog, CameraError> {
        let devices = self.deps.prober.probe(kind).await?;
        let running = self
            .state
            .settings
            .as_ref()
            .filter(|s| s.mode().catalog() == kind);

        let (selected_device, selected_capability, settings) = match running {
            Some(current) => {
                let device = devices.iter().find(|d| d.id == current.device_id());
                let (width, height) = current.resolution();
                (
                    device.map(|d| d.id.clone()),
                    device
                        .and_then(|d| d.find_capability(width, height, current.format()))
                        .cloned(),
                    Some(current.clone()),
                )
            }
            None => {
                let first = devices.first();
                (
                    first.map(|d| d.id.clone()),
                    first.and_then(|d| d.caps.first()).cloned(),
                    first.and_then(|d| self.template(kind, d)),
                )
            }
        };

        Ok(DeviceCatalog {
            kind,
            devices,
            active: self.state.active,
            mode: self.state.mode,
            selected_device,
            selected_capability,
            settings,
            default_udp: StreamSettings::default_udp(),
            interfaces: self.deps.host.ipv4_addresses(),
        })
    }

    fn template(&self, kind: CatalogKind, device: &CaptureDevice) -> Option<SessionSettings> {
        match kind {
            CatalogKind::Still => {
                let cap = device.caps.first()?;
                Some(SessionSettings::Photo(StillSettings {
                    device: device.id.clone(),
                    width: cap.width,
                    height: cap.height,
                    format: cap.format.clone(),
                }))
            }
            CatalogKind::Video if self.state.mode == CameraMode::Video => {
                VideoSettings::template(device).map(SessionSettings::Video)
            }
            CatalogKind::Video => StreamSettings::template(device).map(SessionSettings::Streaming),
        }
    }
}

fn now_usec() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or(0)
}
