//! capsec command-line interface.

pub mod commands;

use std::path::Path;

use capsec_core::config::LoggingConfig;
use capsec_core::env::vars;
use capsec_core::Config;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// capsec - encrypted storage for small secrets
#[derive(Parser)]
#[command(name = "capsec")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "CAPSEC_CONFIG", global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Store a value (prompts for it when --value is omitted)
    Set {
        /// Entry key
        key: String,

        /// Value to store
        #[arg(long)]
        value: Option<String>,
    },

    /// Print a stored value
    Get {
        /// Entry key
        key: String,
    },

    /// List stored keys
    Keys,

    /// Remove a stored value
    Remove {
        /// Entry key
        key: String,
    },

    /// Remove every stored value (the key pair is kept)
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Print the platform name
    Platform,

    /// Report the selected strategy, vault, and storage locations
    Doctor(commands::doctor::DoctorArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Load the config file at `path`, or the default location when `None`.
///
/// A missing file yields the default configuration.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_or_default(path)?,
        None => Config::load_default()?,
    };
    Ok(config)
}

/// Install the global tracing subscriber.
///
/// `CAPSEC_LOG` wins over `RUST_LOG`; without either the level comes from
/// the config file, raised by each `-v`.
pub fn init_logging(verbose: u8, logging: &LoggingConfig) {
    let fallback = match verbose {
        0 => format!("capsec={}", logging.level),
        1 => "capsec=debug".to_string(),
        _ => "capsec=trace".to_string(),
    };
    let filter = EnvFilter::try_from_env(vars::CAPSEC_LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Set { key, value } => commands::entries::set(&config, &key, value).await,
        Commands::Get { key } => commands::entries::get(&config, &key).await,
        Commands::Keys => commands::entries::keys(&config).await,
        Commands::Remove { key } => commands::entries::remove(&config, &key).await,
        Commands::Clear { yes } => commands::entries::clear(&config, yes).await,
        Commands::Platform => commands::entries::platform(&config).await,
        Commands::Doctor(args) => commands::doctor::run(args, &config).await,
        Commands::Config(args) => commands::config::run(args, cli.config.as_deref(), config).await,
        Commands::Version => {
            println!("capsec {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_version() {
        let cli = Cli::try_parse_from(["capsec", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_parse_set_with_value() {
        let cli = Cli::try_parse_from(["capsec", "set", "token", "--value", "abc"]).unwrap();
        match cli.command {
            Commands::Set { key, value } => {
                assert_eq!(key, "token");
                assert_eq!(value.as_deref(), Some("abc"));
            }
            _ => panic!("Expected Set command"),
        }
    }

    #[test]
    fn test_parse_set_without_value() {
        let cli = Cli::try_parse_from(["capsec", "set", "token"]).unwrap();
        assert!(matches!(cli.command, Commands::Set { value: None, .. }));
    }

    #[test]
    fn test_parse_get_requires_key() {
        assert!(Cli::try_parse_from(["capsec", "get"]).is_err());
    }

    #[test]
    fn test_parse_clear_yes() {
        let cli = Cli::try_parse_from(["capsec", "clear", "--yes"]).unwrap();
        assert!(matches!(cli.command, Commands::Clear { yes: true }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["capsec", "keys", "-vv", "--config", "/tmp/c.json5"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(std::path::PathBuf::from("/tmp/c.json5")));
    }

    #[test]
    fn test_load_config_missing_file_is_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(Some(&tmp.path().join("none.json5"))).unwrap();
        assert_eq!(config.storage.namespace, "cap_sec");
    }
}
