//! Secure key vault collaborator.
//!
//! A vault generates and holds named RSA key pairs. Callers get the public
//! half through the pair's certificate and an opaque [`KeyHandle`] for the
//! private half; every private-key operation happens inside the vault.

mod memory;
mod software;

#[cfg(target_os = "macos")]
mod keychain;

pub use memory::MemoryVault;
pub use software::SoftwareVault;

#[cfg(target_os = "macos")]
pub use keychain::KeychainVault;

use chrono::{DateTime, Months, Utc};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cipher::ChunkedCipher;
use crate::error::{Result, StorageError};
use crate::keys::KeyAlias;

/// Serial number written into self-signed certificates.
pub const CERTIFICATE_SERIAL: u64 = 1337;

/// How long a generated key pair stays valid.
pub const VALIDITY_YEARS: u32 = 10;

/// Opaque reference to a private key held by a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
    alias: KeyAlias,
}

impl KeyHandle {
    pub(crate) fn new(alias: KeyAlias) -> Self {
        Self { alias }
    }

    /// Alias the handle refers to.
    pub fn alias(&self) -> &KeyAlias {
        &self.alias
    }
}

/// Where the vault keeps private key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    /// Key material lives in process memory or on disk.
    Software,
    /// Key material never leaves dedicated hardware.
    Hardware,
}

/// Validity window of a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl Validity {
    /// `[now, now + 10 years]`.
    pub fn ten_years_from(now: DateTime<Utc>) -> Self {
        let not_after = now
            .checked_add_months(Months::new(VALIDITY_YEARS * 12))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            not_before: now,
            not_after,
        }
    }

    /// Whether `at` falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// Permitted use of a generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPurpose {
    Decrypt,
}

/// Digests the key may be used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDigest {
    Sha256,
    Sha512,
}

/// Encryption padding the key is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPadding {
    Pkcs1,
}

/// Parameters for generating a key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyGenSpec {
    /// Full parameter set for vaults that enforce key usage.
    Parameterized {
        alias: KeyAlias,
        purpose: KeyPurpose,
        digests: Vec<KeyDigest>,
        padding: KeyPadding,
        key_bits: usize,
        validity: Validity,
    },
    /// Self-signed certificate description only.
    CertificateOnly {
        alias: KeyAlias,
        subject: String,
        serial: u64,
        key_bits: usize,
        validity: Validity,
    },
}

impl KeyGenSpec {
    /// Alias the pair is generated under.
    pub fn alias(&self) -> &KeyAlias {
        match self {
            Self::Parameterized { alias, .. } | Self::CertificateOnly { alias, .. } => alias,
        }
    }

    /// Requested modulus size.
    pub fn key_bits(&self) -> usize {
        match self {
            Self::Parameterized { key_bits, .. } | Self::CertificateOnly { key_bits, .. } => {
                *key_bits
            }
        }
    }

    /// Requested validity window.
    pub fn validity(&self) -> Validity {
        match self {
            Self::Parameterized { validity, .. } | Self::CertificateOnly { validity, .. } => {
                *validity
            }
        }
    }

    /// Certificate subject, `CN=<alias>` unless given explicitly.
    pub fn subject(&self) -> String {
        match self {
            Self::Parameterized { alias, .. } => format!("CN={alias}"),
            Self::CertificateOnly { subject, .. } => subject.clone(),
        }
    }
}

/// Self-signed certificate describing a stored key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCertificate {
    pub subject: String,
    pub serial: u64,
    pub validity: Validity,
    /// SubjectPublicKeyInfo, PEM-encoded.
    pub public_key_pem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<KeyPurpose>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub digests: Vec<KeyDigest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<KeyPadding>,
}

impl KeyCertificate {
    /// Build the certificate for a freshly generated key.
    pub(crate) fn issue(spec: &KeyGenSpec, private_key: &RsaPrivateKey) -> Result<Self> {
        let public_key_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| StorageError::Vault(format!("public key encoding failed: {e}")))?;

        let (serial, purpose, digests, padding) = match spec {
            KeyGenSpec::Parameterized {
                purpose,
                digests,
                padding,
                ..
            } => (
                CERTIFICATE_SERIAL,
                Some(*purpose),
                digests.clone(),
                Some(*padding),
            ),
            KeyGenSpec::CertificateOnly { serial, .. } => (*serial, None, Vec::new(), None),
        };

        Ok(Self {
            subject: spec.subject(),
            serial,
            validity: spec.validity(),
            public_key_pem,
            purpose,
            digests,
            padding,
        })
    }

    /// Decode the embedded public key.
    ///
    /// Returns `None` when the PEM does not hold a usable RSA key.
    pub fn public_key(&self) -> Option<RsaPublicKey> {
        RsaPublicKey::from_public_key_pem(&self.public_key_pem).ok()
    }

    /// Hex SHA-256 of the PEM-encoded public key.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.public_key_pem.as_bytes()))
    }
}

/// Generate a key pair for `spec`.
pub(crate) fn generate_private_key(spec: &KeyGenSpec) -> Result<RsaPrivateKey> {
    RsaPrivateKey::new(&mut rand::thread_rng(), spec.key_bits())
        .map_err(|e| StorageError::Vault(format!("key generation failed: {e}")))
}

/// Decrypt one RSA/PKCS#1 v1.5 block.
pub(crate) fn decrypt_block(private_key: &RsaPrivateKey, block: &[u8]) -> Result<Vec<u8>> {
    private_key
        .decrypt(Pkcs1v15Encrypt, block)
        .map_err(|e| StorageError::Crypto(format!("block decryption failed: {e}")))
}

/// Opaque secure key vault.
pub trait KeyVault: Send + Sync {
    /// Open the vault, creating backing storage if needed.
    fn load(&self) -> Result<()>;

    /// Handle to the private key stored under `alias`, if any.
    fn key_handle(&self, alias: &KeyAlias) -> Result<Option<KeyHandle>>;

    /// Certificate stored under `alias`, if any.
    fn certificate(&self, alias: &KeyAlias) -> Result<Option<KeyCertificate>>;

    /// Public key from the certificate stored under `alias`.
    fn certificate_public_key(&self, alias: &KeyAlias) -> Result<Option<RsaPublicKey>> {
        Ok(self.certificate(alias)?.and_then(|cert| cert.public_key()))
    }

    /// Generate and store a key pair, replacing any pair under the alias.
    fn generate_key_pair(&self, spec: &KeyGenSpec) -> Result<()>;

    /// Decrypt one RSA/PKCS#1 v1.5 block with the private key behind `handle`.
    fn decrypt(&self, handle: &KeyHandle, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a chunked ciphertext with the private key behind `handle`.
    ///
    /// Vaults that must load the key before using it override this to load
    /// it once for all blocks.
    fn decrypt_chunked(
        &self,
        handle: &KeyHandle,
        cipher: &ChunkedCipher,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        cipher.decrypt(ciphertext, |block| self.decrypt(handle, block))
    }

    /// Remove the key pair stored under `alias`. Missing pairs are not an error.
    fn delete_entry(&self, alias: &KeyAlias) -> Result<()>;

    /// Where the key behind `handle` is kept.
    fn security_level(&self, _handle: &KeyHandle) -> Result<SecurityLevel> {
        Ok(SecurityLevel::Software)
    }

    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &'static str;
}
