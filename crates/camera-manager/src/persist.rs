//! Camera configuration as kept in the configuration store
//!
//! Streaming and video share `camera.videoSettings`; photo uses
//! `camera.stillSettings`. Saving one mode's settings nulls the other key.

use camera_capture::{CameraMode, SessionSettings, StillSettings, StreamSettings, VideoSettings};
use serde_json::Value;
use storage::{ConfigStore, ConfigStoreExt, StorageError};
use tracing::debug;

/// Store keys
pub mod keys {
    pub const ACTIVE: &str = "camera.active";
    pub const MODE: &str = "camera.mode";
    pub const VIDEO_SETTINGS: &str = "camera.videoSettings";
    pub const STILL_SETTINGS: &str = "camera.stillSettings";
    pub const USE_HEARTBEAT: &str = "camera.useHeartbeat";
}

/// Configuration read back at startup
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedConfig {
    pub active: bool,
    pub mode: CameraMode,
    /// Settings stored for `mode`, if any decode
    pub settings: Option<SessionSettings>,
    pub use_heartbeat: bool,
}

pub fn load(store: &dyn ConfigStore) -> SavedConfig {
    let mode: CameraMode = store.get_or(keys::MODE, CameraMode::default());
    let settings = match mode {
        CameraMode::Streaming => store
            .get_or::<Option<StreamSettings>>(keys::VIDEO_SETTINGS, None)
            .map(SessionSettings::Streaming),
        CameraMode::Video => store
            .get_or::<Option<VideoSettings>>(keys::VIDEO_SETTINGS, None)
            .map(SessionSettings::Video),
        CameraMode::Photo => store
            .get_or::<Option<StillSettings>>(keys::STILL_SETTINGS, None)
            .map(SessionSettings::Photo),
    };

    SavedConfig {
        active: store.get_or(keys::ACTIVE, false),
        mode,
        settings,
        use_heartbeat: store.get_or(keys::USE_HEARTBEAT, false),
    }
}

/// Save the settings of a session about to start
pub fn save_session(store: &dyn ConfigStore, settings: &SessionSettings) -> Result<(), StorageError> {
    store.set_value(keys::MODE, &settings.mode())?;
    match settings {
        SessionSettings::Streaming(stream) => {
            store.set_value(keys::VIDEO_SETTINGS, stream)?;
            store.set(keys::STILL_SETTINGS, Value::Null)?;
        }
        SessionSettings::Video(video) => {
            store.set_value(keys::VIDEO_SETTINGS, video)?;
            store.set(keys::STILL_SETTINGS, Value::Null)?;
        }
        SessionSettings::Photo(still) => {
            store.set_value(keys::STILL_SETTINGS, still)?;
            store.set(keys::VIDEO_SETTINGS, Value::Null)?;
        }
    }
    debug!("Saved {} settings for {}", settings.mode(), settings.device_id());
    Ok(())
}

pub fn set_active(store: &dyn ConfigStore, active: bool) -> Result<(), StorageError> {
    store.set_value(keys::ACTIVE, &active)
}

pub fn set_use_heartbeat(store: &dyn ConfigStore, enabled: bool) -> Result<(), StorageError> {
    store.set_value(keys::USE_HEARTBEAT, &enabled)
}

/// Mark inactive and drop all session settings; mode and heartbeat stay
pub fn clear_session(store: &dyn ConfigStore) -> Result<(), StorageError> {
    set_active(store, false)?;
    store.set(keys::VIDEO_SETTINGS, Value::Null)?;
    store.set(keys::STILL_SETTINGS, Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::{Compression, Transport};
    use storage::MemoryStore;

    fn stream() -> SessionSettings {
        SessionSettings::Streaming(StreamSettings {
            video: VideoSettings {
                device: "/dev/video0".to_string(),
                width: 1280,
                height: 720,
                format: "video/x-h264".to_string(),
                bitrate: 1100,
                fps: 30,
                rotation: 0,
                timestamp: false,
                compression: Compression::H264,
            },
            transport: Transport::Rtsp,
            advertised_ip: "10.0.0.2".parse().unwrap(),
        })
    }

    fn photo() -> SessionSettings {
        SessionSettings::Photo(StillSettings {
            device: "/dev/v4l-subdev0".to_string(),
            width: 4608,
            height: 2592,
            format: "SRGGB10_1X10".to_string(),
        })
    }

    #[test]
    fn test_empty_store_loads_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load(&store), SavedConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let store = MemoryStore::new();
        save_session(&store, &stream()).unwrap();
        set_active(&store, true).unwrap();
        set_use_heartbeat(&store, true).unwrap();

        let saved = load(&store);
        assert!(saved.active);
        assert!(saved.use_heartbeat);
        assert_eq!(saved.mode, CameraMode::Streaming);
        assert_eq!(saved.settings, Some(stream()));
    }

    #[test]
    fn test_switching_mode_nulls_other_settings() {
        let store = MemoryStore::new();
        save_session(&store, &stream()).unwrap();
        save_session(&store, &photo()).unwrap();

        assert_eq!(store.get(keys::VIDEO_SETTINGS), Some(Value::Null));
        assert_eq!(load(&store).settings, Some(photo()));
    }

    #[test]
    fn test_clear_keeps_mode_and_heartbeat() {
        let store = MemoryStore::new();
        save_session(&store, &photo()).unwrap();
        set_active(&store, true).unwrap();
        set_use_heartbeat(&store, true).unwrap();

        clear_session(&store).unwrap();
        let saved = load(&store);
        assert!(!saved.active);
        assert!(saved.use_heartbeat);
        assert_eq!(saved.mode, CameraMode::Photo);
        assert_eq!(saved.settings, None);
    }
}
