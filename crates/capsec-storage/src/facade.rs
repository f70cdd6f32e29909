//! Strategy selection and the uniform storage API.
//!
//! [`SecureStorage`] picks its strategy once, at construction:
//!
//! 1. No vault on this platform: basic.
//! 2. Otherwise ask the [`KeyVaultManager`] for a usable key pair. Ready
//!    means strong.
//! 3. Anything else falls back to basic, which has no dependencies and
//!    cannot fail.
//!
//! Under the strong strategy values are RSA-encrypted in chunks and stored
//! as base64 of the concatenated ciphertext. Under the basic strategy values
//! are stored as base64 of the raw bytes. Entries written under one
//! strategy are not readable under the other.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use capsec_core::config::{VaultBackend, DEFAULT_KEY_BITS};
use capsec_core::Config;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cipher::ChunkedCipher;
use crate::error::{Result, StorageError};
use crate::keys::{KeyAlias, KeyPairStatus, KeyVaultManager};
use crate::map::{decode_blob, encode_blob, EncodedMapStore, FileMap};
use crate::platform::PlatformCapabilities;
use crate::vault::{KeyCertificate, KeyVault, SoftwareVault};

/// Which encoding the instance reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStrategy {
    /// Base64 of the raw bytes, no encryption.
    Basic,
    /// Base64 of chunked RSA/PKCS#1 ciphertext.
    Strong,
}

impl fmt::Display for StorageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => f.write_str("basic"),
            Self::Strong => f.write_str("strong"),
        }
    }
}

/// Lenient behaviors preserved from earlier releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatOptions {
    /// Under the strong strategy, a missing public key turns `set_data`
    /// into a no-op and a missing private key makes `get_data` return
    /// `None`. When `false` both return [`StorageError::KeyNotFound`].
    pub silent_missing_key: bool,
}

impl Default for CompatOptions {
    fn default() -> Self {
        Self {
            silent_missing_key: true,
        }
    }
}

/// Construction parameters for [`SecureStorage::initialize`].
#[derive(Debug, Clone)]
pub struct StorageOptions {
    pub alias: KeyAlias,
    pub key_bits: usize,
    pub compat: CompatOptions,
}

impl StorageOptions {
    pub fn for_app(app_id: &str) -> Self {
        Self {
            alias: KeyAlias::for_app(app_id),
            key_bits: DEFAULT_KEY_BITS,
            compat: CompatOptions::default(),
        }
    }
}

struct StrongStrategy {
    keys: KeyVaultManager,
    alias: KeyAlias,
    cipher: ChunkedCipher,
}

enum State {
    Uninitialized,
    Strong(StrongStrategy),
    Basic,
    Closed,
}

/// Key-value store for small secrets.
pub struct SecureStorage {
    state: State,
    store: EncodedMapStore,
    alias: KeyAlias,
    compat: CompatOptions,
    platform: &'static str,
}

/// A storage instance shared between tasks. Every call holds the lock for
/// its whole duration.
pub type SharedStorage = Arc<Mutex<SecureStorage>>;

impl SecureStorage {
    /// Select a strategy and build the instance.
    ///
    /// `vault` is ignored when `capabilities` report no keystore.
    pub fn initialize(
        store: EncodedMapStore,
        vault: Option<Arc<dyn KeyVault>>,
        capabilities: PlatformCapabilities,
        options: StorageOptions,
    ) -> Self {
        let mut storage = Self {
            state: State::Uninitialized,
            store,
            alias: options.alias.clone(),
            compat: options.compat,
            platform: capabilities.platform,
        };

        let strong = match vault {
            Some(vault) if capabilities.keystore_available => {
                Self::init_strong(vault, capabilities, &options)
            }
            _ => {
                info!(platform = capabilities.platform, "no key vault available");
                None
            }
        };

        storage.state = match strong {
            Some(strong) => State::Strong(strong),
            None => State::Basic,
        };
        info!(
            strategy = %storage.strategy().map_or("none".to_string(), |s| s.to_string()),
            namespace = storage.store.namespace(),
            "secure storage initialized"
        );
        storage
    }

    /// Build an instance from configuration: a [`FileMap`] under the data
    /// directory and the configured vault backend.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let data_dir = config.data_dir()?;
        let map = Arc::new(FileMap::new(&data_dir, &config.storage.namespace));
        let mut store = EncodedMapStore::new(map);
        if let Some(legacy) = &config.storage.legacy_namespace {
            store = store.with_legacy(Arc::new(FileMap::new(&data_dir, legacy)));
        }

        let capabilities = PlatformCapabilities::detect(&config.vault);
        let vault = select_vault(config)?;
        let options = StorageOptions {
            alias: KeyAlias::for_app(&config.storage.app_id),
            key_bits: config.vault.key_bits,
            compat: CompatOptions {
                silent_missing_key: config.storage.compat.silent_missing_key,
            },
        };

        Ok(Self::initialize(store, vault, capabilities, options))
    }

    /// Wrap the instance for shared use across tasks.
    pub fn into_shared(self) -> SharedStorage {
        Arc::new(Mutex::new(self))
    }

    fn init_strong(
        vault: Arc<dyn KeyVault>,
        capabilities: PlatformCapabilities,
        options: &StorageOptions,
    ) -> Option<StrongStrategy> {
        let keys = KeyVaultManager::new(vault, capabilities, options.key_bits);
        match keys.ensure_key_pair(&options.alias) {
            KeyPairStatus::Ready => {
                debug!(alias = %options.alias, vault = keys.vault_name(), "strong strategy ready");
                Some(StrongStrategy {
                    cipher: ChunkedCipher::new(options.key_bits),
                    alias: options.alias.clone(),
                    keys,
                })
            }
            KeyPairStatus::Unavailable => {
                warn!(
                    alias = %options.alias,
                    vault = keys.vault_name(),
                    "strong storage initialization failed, falling back to basic storage"
                );
                None
            }
        }
    }

    /// Whether a strategy has been selected and the instance is not closed.
    pub fn is_initialized(&self) -> bool {
        matches!(self.state, State::Strong(_) | State::Basic)
    }

    /// Active strategy, `None` before initialization or after close.
    pub fn strategy(&self) -> Option<StorageStrategy> {
        match self.state {
            State::Strong(_) => Some(StorageStrategy::Strong),
            State::Basic => Some(StorageStrategy::Basic),
            State::Uninitialized | State::Closed => None,
        }
    }

    /// Alias of the key pair this instance uses under the strong strategy.
    pub fn alias(&self) -> &KeyAlias {
        &self.alias
    }

    /// Namespace of the underlying map.
    pub fn namespace(&self) -> &str {
        self.store.namespace()
    }

    /// Platform name resolved at construction.
    pub fn platform(&self) -> &'static str {
        self.platform
    }

    /// Vault backend in use, if the strong strategy is active.
    pub fn vault_name(&self) -> Option<&'static str> {
        match &self.state {
            State::Strong(strong) => Some(strong.keys.vault_name()),
            _ => None,
        }
    }

    /// Certificate of the active key pair, if the strong strategy is active.
    pub fn certificate(&self) -> Result<Option<KeyCertificate>> {
        match &self.state {
            State::Strong(strong) => strong.keys.certificate(&strong.alias),
            _ => Ok(None),
        }
    }

    /// Stop using the instance. Every later call fails with
    /// [`StorageError::NotInitialized`].
    pub fn close(&mut self) {
        debug!(namespace = self.store.namespace(), "closing secure storage");
        self.state = State::Closed;
    }

    /// Store `data` under `key`. `None` leaves any existing value untouched.
    pub async fn set_data(&self, key: &str, data: Option<&[u8]>) -> Result<()> {
        self.check_initialized()?;
        validate_key(key)?;

        let Some(data) = data else {
            debug!(key, "set_data without data, nothing written");
            return Ok(());
        };

        let blob = match &self.state {
            State::Strong(strong) => {
                let public_key = match strong.keys.public_key(&strong.alias) {
                    Ok(public_key) => public_key,
                    // Drops the write; kept for callers relying on it.
                    Err(StorageError::KeyNotFound(alias)) if self.compat.silent_missing_key => {
                        warn!(key, %alias, "public key not found in vault, value not stored");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                };
                let ciphertext = strong.cipher.encrypt_with_public_key(&public_key, data)?;
                encode_blob(&ciphertext)
            }
            State::Basic => encode_blob(data),
            State::Uninitialized | State::Closed => return Err(StorageError::NotInitialized),
        };

        self.store.put(key, Some(blob)).await
    }

    /// Value stored under `key`, or `None` if there is none.
    pub async fn get_data(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_initialized()?;
        validate_key(key)?;

        let Some(blob) = self.store.get(key).await? else {
            return Ok(None);
        };
        let bytes = decode_blob(key, &blob)?;

        match &self.state {
            State::Strong(strong) => {
                match strong.keys.decrypt_with_private_key(&strong.alias, &bytes) {
                    Ok(plaintext) => Ok(Some(plaintext)),
                    // Masks the missing key as an absent value; kept for callers relying on it.
                    Err(StorageError::KeyNotFound(alias)) if self.compat.silent_missing_key => {
                        warn!(key, %alias, "private key not found in vault, reporting no value");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
            State::Basic => Ok(Some(bytes)),
            State::Uninitialized | State::Closed => Err(StorageError::NotInitialized),
        }
    }

    /// All stored keys.
    pub async fn keys(&self) -> Result<BTreeSet<String>> {
        self.check_initialized()?;
        self.store.keys().await
    }

    /// Whether an entry exists under `key`, including one still in the
    /// legacy namespace.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        self.check_initialized()?;
        validate_key(key)?;
        self.store.contains(key).await
    }

    /// Remove `key`. The key pair is never touched.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.check_initialized()?;
        validate_key(key)?;
        self.store.remove(key).await
    }

    /// Remove every entry. The key pair is never touched.
    pub async fn clear(&self) -> Result<()> {
        self.check_initialized()?;
        self.store.clear().await
    }

    fn check_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

/// Vault for the configured backend, `None` when the backend cannot run here.
fn select_vault(config: &Config) -> Result<Option<Arc<dyn KeyVault>>> {
    let vault: Option<Arc<dyn KeyVault>> = match config.vault.backend {
        VaultBackend::Disabled => None,
        VaultBackend::Software => Some(Arc::new(SoftwareVault::new(config.vault_dir()?))),
        VaultBackend::Keychain => keychain_vault(),
        VaultBackend::Auto => match keychain_vault() {
            Some(vault) => Some(vault),
            None => Some(Arc::new(SoftwareVault::new(config.vault_dir()?))),
        },
    };
    Ok(vault)
}

#[cfg(target_os = "macos")]
fn keychain_vault() -> Option<Arc<dyn KeyVault>> {
    Some(Arc::new(crate::vault::KeychainVault::new()))
}

#[cfg(not(target_os = "macos"))]
fn keychain_vault() -> Option<Arc<dyn KeyVault>> {
    debug!("keychain vault is only available on macOS");
    None
}
