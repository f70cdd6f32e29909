//! Path resolution utilities.

use crate::env::{self, vars};
use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the capsec base directory.
///
/// Honors `CAPSEC_HOME` when set, otherwise `~/.capsec`.
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::get_var(vars::CAPSEC_HOME) {
        return Ok(expand_tilde(&home));
    }
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".capsec"))
}

/// Get the main config file path (~/.capsec/capsec.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("capsec.json5"))
}

/// Get the default data directory holding encoded maps (~/.capsec/data).
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("data"))
}

/// Get the software vault directory (~/.capsec/vault).
pub fn vault_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("vault"))
}

/// Ensure all required directories exist.
pub fn ensure_dirs() -> Result<(), ConfigError> {
    let dirs = [base_dir()?, data_dir()?, vault_dir()?];

    for dir in dirs {
        std::fs::create_dir_all(&dir)?;
    }

    Ok(())
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
