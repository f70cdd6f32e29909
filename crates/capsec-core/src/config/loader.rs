//! Configuration loading and persistence.

use super::Config;
use crate::env::{self, vars};
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key sizes accepted for newly generated key pairs.
const ALLOWED_KEY_BITS: [usize; 3] = [2048, 3072, 4096];

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file yields the defaults; environment overrides are applied
    /// either way.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load_or_default(&path)
    }

    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `CAPSEC_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(app_id) = env::get_var(vars::CAPSEC_APP_ID) {
            debug!(%app_id, "app id taken from environment");
            self.storage.app_id = app_id;
        }
        if env::get_bool(vars::CAPSEC_FORCE_BASIC) {
            warn!("{} is set, values will be stored unencrypted", vars::CAPSEC_FORCE_BASIC);
            self.vault.backend = super::VaultBackend::Disabled;
        }
    }

    /// Directory holding the encoded map files.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::data_dir(),
        }
    }

    /// Directory used by the software vault.
    pub fn vault_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.vault.dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::vault_dir(),
        }
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Namespace becomes a file name, keep it to safe characters
        if let Err(reason) = check_name(&self.storage.namespace) {
            errors.push(format!("storage.namespace {reason}"));
        }
        if let Some(legacy) = &self.storage.legacy_namespace {
            if let Err(reason) = check_name(legacy) {
                errors.push(format!("storage.legacy_namespace {reason}"));
            }
            if *legacy == self.storage.namespace {
                errors.push(
                    "storage.legacy_namespace must differ from storage.namespace".to_string(),
                );
            }
        }

        // 2. App id feeds the key alias, which the vault uses as a file or account name
        if let Err(reason) = check_name(&self.storage.app_id) {
            errors.push(format!("storage.app_id {reason}"));
        }

        // 3. Key size
        if !ALLOWED_KEY_BITS.contains(&self.vault.key_bits) {
            errors.push(format!(
                "vault.key_bits must be one of {:?}, got {}",
                ALLOWED_KEY_BITS, self.vault.key_bits
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

/// Names that end up in file names: `[A-Za-z0-9_.-]`, no leading '.'.
fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(format!(
            "'{name}' may only contain alphanumerics, '_', '-' and '.'"
        ));
    }
    if name.starts_with('.') {
        return Err(format!("'{name}' must not start with '.'"));
    }
    Ok(())
}
