//! Shared helpers for the capsec integration tests.

use std::path::Path;

use capsec_core::config::VaultBackend;
use capsec_core::Config;

/// Configuration with every directory inside `root`.
pub fn config_in(root: &Path, backend: VaultBackend) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = Some(root.join("data"));
    config.vault.dir = Some(root.join("vault"));
    config.vault.backend = backend;
    config
}
