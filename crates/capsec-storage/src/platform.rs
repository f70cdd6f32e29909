//! Platform capability detection, resolved once per storage instance.

use capsec_core::config::{VaultBackend, VaultConfig};

/// What the current platform offers the strong strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Whether any asymmetric key vault can be used at all.
    pub keystore_available: bool,
    /// Whether key generation accepts purpose/digest/padding parameters.
    /// Without them only a certificate description is passed.
    pub fine_grained_key_params: bool,
    /// Short platform name reported to callers.
    pub platform: &'static str,
}

impl PlatformCapabilities {
    /// Detect the running platform, honoring config overrides.
    pub fn detect(config: &VaultConfig) -> Self {
        let keystore_available = match config.backend {
            VaultBackend::Disabled => false,
            VaultBackend::Keychain => cfg!(target_os = "macos"),
            VaultBackend::Auto | VaultBackend::Software => true,
        };

        Self {
            keystore_available,
            fine_grained_key_params: config.fine_grained_params.unwrap_or(true),
            platform: platform_name(),
        }
    }

    /// Capabilities of a platform without any vault.
    pub fn basic_only() -> Self {
        Self {
            keystore_available: false,
            fine_grained_key_params: false,
            platform: platform_name(),
        }
    }
}

/// Name of the target OS.
pub fn platform_name() -> &'static str {
    std::env::consts::OS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_backend_has_no_keystore() {
        let config = VaultConfig {
            backend: VaultBackend::Disabled,
            ..VaultConfig::default()
        };
        assert!(!PlatformCapabilities::detect(&config).keystore_available);
    }

    #[test]
    fn test_software_backend_is_always_available() {
        let config = VaultConfig {
            backend: VaultBackend::Software,
            fine_grained_params: Some(false),
            ..VaultConfig::default()
        };
        let caps = PlatformCapabilities::detect(&config);
        assert!(caps.keystore_available);
        assert!(!caps.fine_grained_key_params);
    }

    #[test]
    fn test_keychain_backend_only_on_macos() {
        let config = VaultConfig {
            backend: VaultBackend::Keychain,
            ..VaultConfig::default()
        };
        assert_eq!(
            PlatformCapabilities::detect(&config).keystore_available,
            cfg!(target_os = "macos")
        );
    }

    #[test]
    fn test_platform_name_matches_target() {
        assert_eq!(PlatformCapabilities::basic_only().platform, std::env::consts::OS);
    }
}
