//! Configuration management commands.

use std::path::{Path, PathBuf};

use capsec_core::paths;
use capsec_core::Config;
use clap::Args;

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

/// Run the config command against the file at `path` (or the default
/// location) with `config` already loaded from it.
pub async fn run(args: ConfigArgs, path: Option<&Path>, config: Config) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", config.to_json5()?);
        }

        ConfigCommand::Get { key } => {
            let json = serde_json::to_value(&config)?;
            match lookup(&json, &key) {
                Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }

        ConfigCommand::Set { key, value } => {
            let updated = with_value(&config, &key, &value)?;
            updated.validate()?;
            updated.save(&target(path)?)?;
            println!("Set {} = {}", key, value);
        }

        ConfigCommand::Init { force } => {
            let explicit = path.is_some();
            let path = target(path)?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?}. Use --force to overwrite.",
                    path
                );
            }

            if !explicit {
                paths::ensure_dirs()?;
            }
            Config::default().save(&path)?;
            println!("Created config file: {:?}", path);
        }

        ConfigCommand::Path => {
            println!("{}", target(path)?.display());
        }

        ConfigCommand::Validate => match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => anyhow::bail!("Configuration error: {}", e),
        },
    }

    Ok(())
}

fn target(path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(paths::config_file()?),
    }
}

fn lookup<'a>(json: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    key.split('.').try_fold(json, |acc, k| acc.get(k))
}

/// Copy of `config` with the dot-separated `key` set to `value`.
///
/// `value` is parsed as JSON first so numbers and booleans keep their type;
/// anything else is stored as a string.
fn with_value(config: &Config, key: &str, value: &str) -> anyhow::Result<Config> {
    let mut json = serde_json::to_value(config)?;

    let parts: Vec<&str> = key.split('.').collect();
    let mut current = &mut json;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            let parsed: serde_json::Value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            current[part] = parsed;
        } else {
            if !current.get(part).is_some_and(|v| v.is_object()) {
                current[part] = serde_json::json!({});
            }
            current = &mut current[part];
        }
    }

    serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid configuration after set: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsec_core::config::VaultBackend;

    #[test]
    fn test_dot_path_get() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(
            lookup(&json, "storage.namespace"),
            Some(&serde_json::json!("cap_sec"))
        );
        assert_eq!(lookup(&json, "vault.key_bits"), Some(&serde_json::json!(2048)));
        assert!(lookup(&json, "storage.nope").is_none());
    }

    #[test]
    fn test_set_keeps_types() {
        let config = Config::default();

        let updated = with_value(&config, "vault.key_bits", "4096").unwrap();
        assert_eq!(updated.vault.key_bits, 4096);

        let updated = with_value(&config, "vault.backend", "software").unwrap();
        assert_eq!(updated.vault.backend, VaultBackend::Software);

        let updated = with_value(&config, "storage.compat.silent_missing_key", "false").unwrap();
        assert!(!updated.storage.compat.silent_missing_key);
    }

    #[test]
    fn test_set_rejects_wrong_shape() {
        let config = Config::default();
        assert!(with_value(&config, "vault.key_bits", "lots").is_err());
    }

    #[tokio::test]
    async fn test_init_refuses_overwrite() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("capsec.json5");

        let init = |force| ConfigArgs {
            command: ConfigCommand::Init { force },
        };

        run(init(false), Some(&path), Config::default()).await.unwrap();
        assert!(path.exists());
        assert!(run(init(false), Some(&path), Config::default()).await.is_err());
        run(init(true), Some(&path), Config::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_persists() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("capsec.json5");

        let args = ConfigArgs {
            command: ConfigCommand::Set {
                key: "storage.app_id".into(),
                value: "com.example.cli".into(),
            },
        };
        run(args, Some(&path), Config::default()).await.unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.storage.app_id, "com.example.cli");
    }
}
