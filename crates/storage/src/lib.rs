//! Storage Layer
//!
//! Provides the key/value configuration store the camera persists its
//! session into, with an in-memory and a JSON-file backend.

mod store;

pub use store::{ConfigStore, ConfigStoreExt, JsonFileStore, MemoryStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}
