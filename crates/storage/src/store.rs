//! Configuration store backends

use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Narrow get/set contract over persisted configuration
///
/// Writing `Value::Null` clears a key.
pub trait ConfigStore: Send + Sync {
    /// Current value of `key`, if set
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Typed access on top of [`ConfigStore`]
pub trait ConfigStoreExt: ConfigStore {
    /// Decode `key`, falling back to `default` when unset, null or undecodable
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            None | Some(Value::Null) => default,
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Ignoring stored {}: {}", key, e);
                default
            }),
        }
    }

    /// Encode and store `value` under `key`
    fn set_value<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)
            .map_err(|e| StorageError::SerializationError(format!("{}: {}", key, e)))?;
        self.set(key, value)
    }
}

impl<S: ConfigStore + ?Sized> ConfigStoreExt for S {}

/// Volatile store (tests, `--probe` runs)
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by one JSON object on disk
///
/// Every `set` rewrites the file through a temporary sibling and a rename,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Load `path`, starting empty if it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Map::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                StorageError::SerializationError(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings at {}, starting empty", path.display());
                Map::new()
            }
            Err(e) => return Err(io_error(&path, e)),
        };

        debug!("Loaded {} settings from {}", values.len(), path.display());
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<(), StorageError> {
        let contents = serde_json::to_string_pretty(values)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, contents).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, e))
    }
}

impl ConfigStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        let mut updated = values.clone();
        updated.insert(key.to_string(), value);
        self.persist(&updated)?;
        *values = updated;
        debug!("Stored {} in {}", key, self.path.display());
        Ok(())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
