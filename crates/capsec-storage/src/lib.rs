//! Secure key-value storage for small secrets.
//!
//! Values are encrypted with an RSA key pair held by a [`vault::KeyVault`]
//! when one is available, and stored base64-encoded without encryption
//! otherwise. The choice is made once per [`SecureStorage`] instance.

pub mod cipher;
pub mod error;
pub mod facade;
pub mod keys;
pub mod map;
pub mod platform;
pub mod plugin;
pub mod vault;

pub use cipher::ChunkedCipher;
pub use error::{Result, StorageError};
pub use facade::{CompatOptions, SecureStorage, SharedStorage, StorageOptions, StorageStrategy};
pub use keys::{KeyAlias, KeyPairStatus, KeyVaultManager};
pub use map::{DurableMap, EncodedMapStore, FileMap, MemoryMap};
pub use platform::PlatformCapabilities;
pub use plugin::SecureStoragePlugin;
pub use vault::{KeyVault, MemoryVault, SoftwareVault};
