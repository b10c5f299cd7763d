//! Camera service
//!
//! One task owns the [`CameraManager`]. Requests, process exits and
//! heartbeat ticks are handled strictly one at a time, so no two
//! transitions ever overlap. Callers talk to it through [`CameraHandle`].

use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use camera_capture::{CatalogKind, ProcessExit, SessionSettings};
use camera_protocol::{CameraTrigger, InboundCommand};

use crate::error::CameraError;
use crate::events::{CameraEvent, EventSink};
use crate::manager::{CameraDeps, CameraManager, ManagerConfig};
use crate::state::{DeviceCatalog, StartOutcome, SystemStatus};

const REQUEST_BUFFER: usize = 32;

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub manager: ManagerConfig,
    /// Status snapshot refresh period
    pub status_interval: Duration,
    /// Capacity of the outbound event channel
    pub event_buffer: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            status_interval: Duration::from_secs(1),
            event_buffer: 64,
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, CameraError>>;

enum Request {
    Start {
        settings: SessionSettings,
        use_heartbeat: bool,
        reply: Reply<StartOutcome>,
    },
    Stop {
        reply: Reply<SystemStatus>,
    },
    CapturePhoto {
        reply: Reply<CameraTrigger>,
    },
    ToggleRecording {
        reply: Reply<bool>,
    },
    SetHeartbeat {
        enabled: bool,
        reply: Reply<()>,
    },
    Catalog {
        kind: CatalogKind,
        reply: Reply<DeviceCatalog>,
    },
    Command(InboundCommand),
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable front-end to the camera service
#[derive(Clone)]
pub struct CameraHandle {
    requests: mpsc::Sender<Request>,
    status: watch::Receiver<SystemStatus>,
}

impl CameraHandle {
    async fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T, CameraError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(request(tx))
            .await
            .map_err(|_| CameraError::Busy)?;
        rx.await.map_err(|_| CameraError::Busy)?
    }

    pub async fn start_camera(
        &self,
        settings: SessionSettings,
        use_heartbeat: bool,
    ) -> Result<StartOutcome, CameraError> {
        self.call(|reply| Request::Start {
            settings,
            use_heartbeat,
            reply,
        })
        .await
    }

    /// Stop the camera; the returned status is always inactive
    pub async fn stop_camera(&self) -> Result<SystemStatus, CameraError> {
        self.call(|reply| Request::Stop { reply }).await
    }

    pub async fn capture_still_photo(&self) -> Result<CameraTrigger, CameraError> {
        self.call(|reply| Request::CapturePhoto { reply }).await
    }

    /// Returns whether recording is now running
    pub async fn toggle_video_recording(&self) -> Result<bool, CameraError> {
        self.call(|reply| Request::ToggleRecording { reply }).await
    }

    pub async fn set_use_heartbeat(&self, enabled: bool) -> Result<(), CameraError> {
        self.call(|reply| Request::SetHeartbeat { enabled, reply }).await
    }

    pub async fn video_devices(&self) -> Result<DeviceCatalog, CameraError> {
        self.call(|reply| Request::Catalog {
            kind: CatalogKind::Video,
            reply,
        })
        .await
    }

    pub async fn still_devices(&self) -> Result<DeviceCatalog, CameraError> {
        self.call(|reply| Request::Catalog {
            kind: CatalogKind::Still,
            reply,
        })
        .await
    }

    /// Queue an inbound vehicle-link command; replies arrive as events
    pub async fn submit_command(&self, cmd: InboundCommand) -> Result<(), CameraError> {
        self.requests
            .send(Request::Command(cmd))
            .await
            .map_err(|_| CameraError::Busy)
    }

    /// Terminate the capture process, keep the saved configuration and end
    /// the service task
    pub async fn shutdown(&self) -> Result<(), CameraError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(Request::Shutdown { reply: tx })
            .await
            .map_err(|_| CameraError::Busy)?;
        rx.await.map_err(|_| CameraError::Busy)
    }

    /// Latest status snapshot
    pub fn status(&self) -> SystemStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SystemStatus> {
        self.status.clone()
    }
}

/// The task owning the camera state
pub struct CameraService {
    manager: CameraManager,
    requests: mpsc::Receiver<Request>,
    exits: mpsc::Receiver<ProcessExit>,
    status: watch::Sender<SystemStatus>,
    status_interval: Duration,
}

impl CameraService {
    pub fn new(deps: CameraDeps, config: ServiceConfig) -> (Self, CameraHandle, mpsc::Receiver<CameraEvent>) {
        let (sink, events) = EventSink::channel(config.event_buffer);
        let (manager, exits) = CameraManager::new(deps, config.manager, sink);
        let (requests_tx, requests) = mpsc::channel(REQUEST_BUFFER);
        let (status, status_rx) = watch::channel(manager.status());

        let service = Self {
            manager,
            requests,
            exits,
            status,
            status_interval: config.status_interval,
        };
        let handle = CameraHandle {
            requests: requests_tx,
            status: status_rx,
        };
        (service, handle, events)
    }

    /// Create the service and run it on a new task
    pub fn spawn(deps: CameraDeps, config: ServiceConfig) -> (CameraHandle, mpsc::Receiver<CameraEvent>, JoinHandle<()>) {
        let (service, handle, events) = Self::new(deps, config);
        let task = tokio::spawn(service.run());
        (handle, events, task)
    }

    /// Restore saved state, then serve until shutdown or every handle is dropped
    pub async fn run(mut self) {
        if let Err(e) = self.manager.initialize().await {
            warn!("Camera initialization failed: {}", e);
        }
        self.publish_status();

        let mut status_tick = tokio::time::interval(self.status_interval);
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => {
                        if !self.handle(request).await {
                            break;
                        }
                    }
                    None => {
                        info!("All camera handles dropped, shutting down");
                        self.manager.shutdown().await;
                        break;
                    }
                },
                Some(exit) = self.exits.recv() => {
                    if let Err(e) = self.manager.handle_exit(exit) {
                        error!("Failed to record session end: {}", e);
                    }
                }
                _ = self.manager.next_heartbeat() => self.manager.emit_heartbeat(),
                _ = status_tick.tick() => {}
            }
            self.publish_status();
        }

        self.publish_status();
        info!("Camera service stopped");
    }

    /// Returns false when the service should stop
    async fn handle(&mut self, request: Request) -> bool {
        match request {
            Request::Start {
                settings,
                use_heartbeat,
                reply,
            } => {
                let result = self.manager.start_camera(settings, use_heartbeat).await;
                let _ = reply.send(result);
            }
            Request::Stop { reply } => {
                let result = self.manager.stop_camera().await.map(|_| self.manager.status());
                let _ = reply.send(result);
            }
            Request::CapturePhoto { reply } => {
                let _ = reply.send(self.manager.capture_still_photo());
            }
            Request::ToggleRecording { reply } => {
                let _ = reply.send(self.manager.toggle_video_recording());
            }
            Request::SetHeartbeat { enabled, reply } => {
                let _ = reply.send(self.manager.set_use_heartbeat(enabled).await);
            }
            Request::Catalog { kind, reply } => {
                let result = match kind {
                    CatalogKind::Video => self.manager.video_devices().await,
                    CatalogKind::Still => self.manager.still_devices().await,
                };
                let _ = reply.send(result);
            }
            Request::Command(cmd) => {
                if let Some(request) = self.manager.handle_command(&cmd) {
                    debug!("Dispatched {:?}", request);
                }
            }
            Request::Shutdown { reply } => {
                self.manager.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn publish_status(&self) {
        self.status.send_replace(self.manager.status());
    }
}
