//! File-backed software vault.
//!
//! Layout under the vault directory:
//!
//! ```text
//! <alias>.key.pem    PKCS#8 private key, mode 0600
//! <alias>.cert.json  KeyCertificate, mode 0600
//! ```
//!
//! The private key file is read once per decrypt call, for every block of a
//! chunked ciphertext, and the parsed key is dropped (and zeroized by `rsa`)
//! when the call returns.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use tracing::{debug, warn};

use super::{
    decrypt_block, generate_private_key, KeyCertificate, KeyGenSpec, KeyHandle, KeyVault,
};
use crate::cipher::ChunkedCipher;
use crate::error::{Result, StorageError};
use crate::keys::KeyAlias;

/// Software [`KeyVault`] keeping each pair as two files in one directory.
pub struct SoftwareVault {
    dir: PathBuf,
}

impl SoftwareVault {
    /// Create a vault rooted at `dir`. Nothing touches disk until [`KeyVault::load`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Vault directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, alias: &KeyAlias) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}.key.pem", file_stem(alias)?)))
    }

    fn cert_path(&self, alias: &KeyAlias) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}.cert.json", file_stem(alias)?)))
    }

    fn read_private_key(&self, alias: &KeyAlias) -> Result<RsaPrivateKey> {
        let path = self.key_path(alias)?;
        let pem = match fs::read_to_string(&path) {
            Ok(pem) => zeroize::Zeroizing::new(pem),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::KeyNotFound(alias.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| StorageError::Vault(format!("unreadable private key for {alias}: {e}")))
    }
}

/// Aliases become file names; refuse anything that could leave the directory.
fn file_stem(alias: &KeyAlias) -> Result<&str> {
    let stem = alias.as_str();
    let safe = !stem.is_empty()
        && !stem.starts_with('.')
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if safe {
        Ok(stem)
    } else {
        Err(StorageError::Vault(format!(
            "alias cannot be used as a file name: {stem}"
        )))
    }
}

/// Write `data` to `path` atomically with mode 0600 on Unix.
fn write_private_file(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl KeyVault for SoftwareVault {
    fn load(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))?;
        }

        Ok(())
    }

    fn key_handle(&self, alias: &KeyAlias) -> Result<Option<KeyHandle>> {
        Ok(self
            .key_path(alias)?
            .is_file()
            .then(|| KeyHandle::new(alias.clone())))
    }

    fn certificate(&self, alias: &KeyAlias) -> Result<Option<KeyCertificate>> {
        let path = self.cert_path(alias)?;
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&data) {
            Ok(cert) => Ok(Some(cert)),
            Err(e) => {
                warn!(path = %path.display(), "ignoring malformed certificate: {e}");
                Ok(None)
            }
        }
    }

    fn generate_key_pair(&self, spec: &KeyGenSpec) -> Result<()> {
        let alias = spec.alias();
        let key_path = self.key_path(alias)?;
        let cert_path = self.cert_path(alias)?;

        debug!(%alias, bits = spec.key_bits(), dir = %self.dir.display(), "generating key pair");
        let private_key = generate_private_key(spec)?;
        let certificate = KeyCertificate::issue(spec, &private_key)?;

        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| StorageError::Vault(format!("private key encoding failed: {e}")))?;

        // Certificate last: a pair only counts once both halves exist.
        write_private_file(&key_path, pem.as_bytes())?;
        let json = serde_json::to_string_pretty(&certificate)?;
        write_private_file(&cert_path, json.as_bytes())?;
        Ok(())
    }

    fn decrypt(&self, handle: &KeyHandle, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let private_key = self.read_private_key(handle.alias())?;
        decrypt_block(&private_key, ciphertext)
    }

    fn decrypt_chunked(
        &self,
        handle: &KeyHandle,
        cipher: &ChunkedCipher,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let private_key = self.read_private_key(handle.alias())?;
        cipher.decrypt(ciphertext, |block| decrypt_block(&private_key, block))
    }

    fn delete_entry(&self, alias: &KeyAlias) -> Result<()> {
        remove_if_present(&self.cert_path(alias)?)?;
        remove_if_present(&self.key_path(alias)?)
    }

    fn name(&self) -> &'static str {
        "software"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{KeyDigest, KeyPadding, KeyPurpose, Validity};
    use chrono::Utc;
    use tempfile::TempDir;

    fn spec(alias: &KeyAlias) -> KeyGenSpec {
        KeyGenSpec::Parameterized {
            alias: alias.clone(),
            purpose: KeyPurpose::Decrypt,
            digests: vec![KeyDigest::Sha256, KeyDigest::Sha512],
            padding: KeyPadding::Pkcs1,
            key_bits: 2048,
            validity: Validity::ten_years_from(Utc::now()),
        }
    }

    #[test]
    fn test_empty_vault_has_nothing() {
        let tmp = TempDir::new().unwrap();
        let vault = SoftwareVault::new(tmp.path().join("vault"));
        vault.load().unwrap();

        let alias = KeyAlias::for_app("com.example");
        assert!(vault.key_handle(&alias).unwrap().is_none());
        assert!(vault.certificate(&alias).unwrap().is_none());
        assert!(vault.certificate_public_key(&alias).unwrap().is_none());
    }

    #[test]
    fn test_generate_persists_both_halves() {
        let tmp = TempDir::new().unwrap();
        let vault = SoftwareVault::new(tmp.path());
        vault.load().unwrap();

        let alias = KeyAlias::for_app("com.example");
        vault.generate_key_pair(&spec(&alias)).unwrap();

        // A fresh instance over the same directory sees the pair.
        let reopened = SoftwareVault::new(tmp.path());
        assert!(reopened.key_handle(&alias).unwrap().is_some());
        let cert = reopened.certificate(&alias).unwrap().unwrap();
        assert_eq!(cert.subject, "CN=com.example_cap_sec");
        assert!(cert.public_key().is_some());
        assert_eq!(cert.digests, vec![KeyDigest::Sha256, KeyDigest::Sha512]);
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let vault = SoftwareVault::new(tmp.path().join("vault"));
        vault.load().unwrap();
        let alias = KeyAlias::for_app("perm");
        vault.generate_key_pair(&spec(&alias)).unwrap();

        let key_mode = fs::metadata(vault.key_path(&alias).unwrap())
            .unwrap()
            .permissions()
            .mode();
        let dir_mode = fs::metadata(vault.dir()).unwrap().permissions().mode();
        assert_eq!(key_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_malformed_certificate_reads_as_absent() {
        let tmp = TempDir::new().unwrap();
        let vault = SoftwareVault::new(tmp.path());
        vault.load().unwrap();
        let alias = KeyAlias::for_app("broken");
        fs::write(vault.cert_path(&alias).unwrap(), "{ not json").unwrap();

        assert!(vault.certificate(&alias).unwrap().is_none());
    }

    #[test]
    fn test_decrypt_without_key_is_key_not_found() {
        let tmp = TempDir::new().unwrap();
        let vault = SoftwareVault::new(tmp.path());
        vault.load().unwrap();
        let handle = KeyHandle::new(KeyAlias::for_app("absent"));

        let result = vault.decrypt(&handle, &[0u8; 256]);
        assert!(matches!(result, Err(StorageError::KeyNotFound(_))));
    }

    #[test]
    fn test_decrypt_chunked_multi_block() {
        let tmp = TempDir::new().unwrap();
        let vault = SoftwareVault::new(tmp.path());
        vault.load().unwrap();
        let alias = KeyAlias::for_app("chunked");
        vault.generate_key_pair(&spec(&alias)).unwrap();

        let cipher = ChunkedCipher::new(2048);
        let public_key = vault.certificate_public_key(&alias).unwrap().unwrap();
        let plaintext: Vec<u8> = (0..1000).map(|i| (i % 253) as u8).collect();
        let ciphertext = cipher.encrypt_with_public_key(&public_key, &plaintext).unwrap();
        assert_eq!(ciphertext.len(), 5 * 256);

        let handle = vault.key_handle(&alias).unwrap().unwrap();
        assert_eq!(
            vault.decrypt_chunked(&handle, &cipher, &ciphertext).unwrap(),
            plaintext
        );
    }

    #[test]
    fn test_decrypt_chunked_without_key_is_key_not_found() {
        let tmp = TempDir::new().unwrap();
        let vault = SoftwareVault::new(tmp.path());
        vault.load().unwrap();
        let handle = KeyHandle::new(KeyAlias::for_app("absent"));

        let result = vault.decrypt_chunked(&handle, &ChunkedCipher::new(2048), &[0u8; 512]);
        assert!(matches!(result, Err(StorageError::KeyNotFound(_))));
    }

    #[test]
    fn test_delete_entry_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let vault = SoftwareVault::new(tmp.path());
        vault.load().unwrap();
        let alias = KeyAlias::for_app("gone");
        vault.generate_key_pair(&spec(&alias)).unwrap();

        vault.delete_entry(&alias).unwrap();
        vault.delete_entry(&alias).unwrap();
        assert!(vault.key_handle(&alias).unwrap().is_none());
    }

    #[test]
    fn test_unsafe_alias_is_rejected() {
        let vault = SoftwareVault::new("/nonexistent");
        let alias = KeyAlias::new("../escape");
        assert!(matches!(
            vault.key_handle(&alias),
            Err(StorageError::Vault(_))
        ));
    }
}
