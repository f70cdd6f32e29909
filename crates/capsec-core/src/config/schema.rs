//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default storage namespace, shared with earlier releases of the store.
pub const DEFAULT_NAMESPACE: &str = "cap_sec";

/// Default application identifier used to derive the key alias.
pub const DEFAULT_APP_ID: &str = "capsec";

/// Default RSA modulus size in bits.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Main capsec configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Encoded map settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Key vault settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Namespace of the durable map; becomes the file stem on disk.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Application identifier. The key alias is `<app_id>_cap_sec`.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Directory holding the map files. Defaults to `~/.capsec/data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Namespace written by older releases. Entries found only there are
    /// moved into `namespace` the first time they are read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_namespace: Option<String>,

    /// Behavior kept for compatibility with existing callers.
    #[serde(default)]
    pub compat: CompatConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            app_id: default_app_id(),
            data_dir: None,
            legacy_namespace: None,
            compat: CompatConfig::default(),
        }
    }
}

/// Compatibility switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatConfig {
    /// Treat a missing key pair as a no-op write and an absent read
    /// instead of returning an error.
    #[serde(default = "default_true")]
    pub silent_missing_key: bool,
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            silent_missing_key: true,
        }
    }
}

/// Which vault implementation backs the strong strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackend {
    /// Pick the best backend available on this platform.
    #[default]
    Auto,
    /// File-backed software vault.
    Software,
    /// OS keychain (macOS only).
    Keychain,
    /// No vault; always use the basic strategy.
    Disabled,
}

/// Vault section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: VaultBackend,

    /// RSA modulus size for newly generated key pairs.
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,

    /// Override detection of fine-grained key generation parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fine_grained_params: Option<bool>,

    /// Directory for the software vault. Defaults to `~/.capsec/vault`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backend: VaultBackend::default(),
            key_bits: default_key_bits(),
            fine_grained_params: None,
            dir: None,
        }
    }
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when no filter is set in the environment.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_app_id() -> String {
    DEFAULT_APP_ID.to_string()
}

fn default_key_bits() -> usize {
    DEFAULT_KEY_BITS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
