//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable as a boolean.
pub fn get_bool(name: &str) -> bool {
    get_var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Common environment variable names.
pub mod vars {
    /// capsec home directory override.
    pub const CAPSEC_HOME: &str = "CAPSEC_HOME";

    /// capsec config file override.
    pub const CAPSEC_CONFIG: &str = "CAPSEC_CONFIG";

    /// capsec log filter (same syntax as `RUST_LOG`).
    pub const CAPSEC_LOG: &str = "CAPSEC_LOG";

    /// Application identifier used to derive the key alias.
    pub const CAPSEC_APP_ID: &str = "CAPSEC_APP_ID";

    /// Force the basic (unencrypted) strategy.
    pub const CAPSEC_FORCE_BASIC: &str = "CAPSEC_FORCE_BASIC";
}
