//! # capsec-core
//!
//! Configuration and shared utilities for capsec.
//!
//! This crate provides functionality used by the storage engine and the CLI:
//!
//! - **Configuration**: Loading, validation, and persistence of the config file
//! - **Paths**: Resolution of the base, data, and vault directories
//! - **Utilities**: Environment handling and zero-on-drop secret strings

pub mod config;
pub mod error;
pub mod paths;
pub mod env;
pub mod secret;

// Re-exports for convenience
pub use config::Config;
pub use error::ConfigError;
pub use secret::SecretString;
