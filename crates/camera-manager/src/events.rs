//! Typed outbound events

use camera_capture::{CameraMode, RuntimeError, SessionId};
use camera_protocol::OutboundMessage;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Everything the camera reports to its collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CameraEvent {
    /// Message for the vehicle link
    Outbound(OutboundMessage),
    /// Saved configuration failed revalidation and was cleared
    ConfigurationDiscarded {
        mode: CameraMode,
        device: Option<String>,
        reason: String,
    },
    SessionStarted {
        session: SessionId,
        mode: CameraMode,
        device: String,
        addresses: Vec<String>,
    },
    /// The capture process is gone; `crash` is set unless it exited cleanly
    SessionEnded {
        session: SessionId,
        mode: CameraMode,
        crash: Option<RuntimeError>,
    },
    RecordingToggled { recording: bool },
}

/// Sending side of the bounded event channel
///
/// Emission never blocks the state machine. A full channel drops the event
/// with a warning.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<CameraEvent>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CameraEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: CameraEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Event channel full, dropping {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event receiver closed");
            }
        }
    }

    pub fn outbound(&self, message: OutboundMessage) {
        debug!("Emitting {}", message.name());
        self.emit(CameraEvent::Outbound(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_protocol::Heartbeat;

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = EventSink::channel(1);
        sink.emit(CameraEvent::RecordingToggled { recording: true });
        sink.emit(CameraEvent::RecordingToggled { recording: false });

        assert_eq!(rx.recv().await, Some(CameraEvent::RecordingToggled { recording: true }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_channel_is_ignored() {
        let (sink, rx) = EventSink::channel(4);
        drop(rx);
        sink.outbound(OutboundMessage::Heartbeat(Heartbeat::camera()));
    }
}
