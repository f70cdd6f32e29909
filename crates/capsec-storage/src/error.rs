//! Error types for secure storage.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage not initialized")]
    NotInitialized,

    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    #[error("Key pair not found in vault: {0}")]
    KeyNotFound(String),

    #[error("Vault error: {0}")]
    Vault(String),

    #[error("Storage commit failed: {0}")]
    Storage(String),

    #[error("Corrupt entry '{key}': {reason}")]
    CorruptEntry { key: String, reason: String },

    #[error("Item with given key does not exist: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Stored value is not valid UTF-8")]
    InvalidUtf8,

    #[error("Configuration error: {0}")]
    Config(#[from] capsec_core::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rsa::Error> for StorageError {
    fn from(e: rsa::Error) -> Self {
        Self::Crypto(e.to_string())
    }
}

/// Convenience result alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
