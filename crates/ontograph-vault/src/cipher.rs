//! AES-256-GCM sealing of credential strings.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use zeroize::Zeroizing;

use ontograph_core::config::VaultSettings;

use crate::{Result, SecretError};

const BLOB_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Symmetric credential vault.
///
/// Holds the current key plus any previous keys still accepted for
/// decryption. Clone is cheap enough to share per service.
#[derive(Clone)]
pub struct SecretVault {
    current: Zeroizing<[u8; KEY_LEN]>,
    previous: Vec<Zeroizing<[u8; KEY_LEN]>>,
}

impl std::fmt::Debug for SecretVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretVault")
            .field("previous_keys", &self.previous.len())
            .finish_non_exhaustive()
    }
}

impl SecretVault {
    /// Create a vault from raw key bytes.
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            current: Zeroizing::new(key),
            previous: Vec::new(),
        }
    }

    /// Create a vault from base64 key text.
    pub fn from_base64(key: &str) -> Result<Self> {
        Ok(Self::new(decode_key(key)?))
    }

    /// Build from configuration: `vault.key` plus `vault.previous_keys`.
    pub fn from_settings(settings: &VaultSettings) -> Result<Self> {
        if settings.key.trim().is_empty() {
            return Err(SecretError::InvalidKey("vault.key is not set".into()));
        }
        let mut vault = Self::from_base64(&settings.key)?;
        for key in &settings.previous_keys {
            vault.previous.push(Zeroizing::new(decode_key(key)?));
        }
        Ok(vault)
    }

    /// Accept blobs sealed under an older key.
    pub fn with_previous_key(mut self, key: [u8; KEY_LEN]) -> Self {
        self.previous.push(Zeroizing::new(key));
        self
    }

    /// Seal a plaintext with no associated context.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        self.encrypt_bound(plaintext, "")
    }

    /// Open a blob sealed with [`SecretVault::encrypt`].
    pub fn decrypt(&self, blob: &str) -> Result<Zeroizing<String>> {
        self.decrypt_bound(blob, "")
    }

    /// Seal a plaintext, authenticating `context` as associated data.
    ///
    /// The same context must be supplied to decrypt.
    pub fn encrypt_bound(&self, plaintext: &str, context: &str) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(self.current.as_slice())
            .map_err(|e| SecretError::InvalidKey(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: context.as_bytes(),
                },
            )
            .map_err(|_| SecretError::Encryption)?;

        let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        blob.push(BLOB_VERSION);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    /// Open a blob sealed with [`SecretVault::encrypt_bound`] under the same
    /// context. Tries the current key, then each previous key.
    pub fn decrypt_bound(&self, blob: &str, context: &str) -> Result<Zeroizing<String>> {
        let raw = STANDARD
            .decode(blob.trim())
            .map_err(|e| SecretError::Malformed(e.to_string()))?;

        if raw.len() < 1 + NONCE_LEN + 16 {
            return Err(SecretError::Malformed("blob too short".into()));
        }
        if raw[0] != BLOB_VERSION {
            return Err(SecretError::Malformed(format!(
                "unsupported blob version {}",
                raw[0]
            )));
        }

        let nonce = Nonce::from_slice(&raw[1..1 + NONCE_LEN]);
        let ciphertext = &raw[1 + NONCE_LEN..];

        for (generation, key) in std::iter::once(&self.current)
            .chain(self.previous.iter())
            .enumerate()
        {
            let cipher = Aes256Gcm::new_from_slice(key.as_slice())
                .map_err(|e| SecretError::InvalidKey(e.to_string()))?;
            let opened = cipher.decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: context.as_bytes(),
                },
            );
            if let Ok(bytes) = opened {
                let bytes = Zeroizing::new(bytes);
                let text = std::str::from_utf8(&bytes).map_err(|_| SecretError::Decryption)?;
                if generation > 0 {
                    tracing::debug!(generation, "Secret opened with a previous vault key; reseal to rotate");
                }
                return Ok(Zeroizing::new(text.to_string()));
            }
        }

        Err(SecretError::Decryption)
    }
}

/// Generate a fresh random key, base64-encoded for configuration.
pub fn generate_key() -> String {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand::thread_rng().fill_bytes(key.as_mut_slice());
    STANDARD.encode(key.as_slice())
}

fn decode_key(text: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = Zeroizing::new(
        STANDARD
            .decode(text.trim())
            .map_err(|e| SecretError::InvalidKey(e.to_string()))?,
    );
    if bytes.len() != KEY_LEN {
        return Err(SecretError::InvalidKey(format!(
            "expected {KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let vault = SecretVault::new([42u8; 32]);
        for plaintext in ["s3cr3t", "", "pässwörd with ünïcode", &"x".repeat(4096)] {
            let blob = vault.encrypt(plaintext).unwrap();
            assert_eq!(vault.decrypt(&blob).unwrap().as_str(), plaintext);
        }
    }

    #[test]
    fn test_blob_does_not_contain_plaintext() {
        let vault = SecretVault::new([42u8; 32]);
        let blob = vault.encrypt("neo4j-password").unwrap();
        assert!(!blob.contains("neo4j-password"));
    }

    #[test]
    fn test_same_plaintext_different_blobs() {
        let vault = SecretVault::new([42u8; 32]);
        let a = vault.encrypt("same").unwrap();
        let b = vault.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let a = SecretVault::new([1u8; 32]);
        let b = SecretVault::new([2u8; 32]);
        let blob = a.encrypt("secret").unwrap();
        assert_eq!(b.decrypt(&blob).unwrap_err(), SecretError::Decryption);
    }

    #[test]
    fn test_decrypt_tampered_blob() {
        let vault = SecretVault::new([42u8; 32]);
        let blob = vault.encrypt("secret").unwrap();
        let mut raw = STANDARD.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = STANDARD.encode(raw);
        assert_eq!(vault.decrypt(&tampered).unwrap_err(), SecretError::Decryption);
    }

    #[test]
    fn test_decrypt_garbage() {
        let vault = SecretVault::new([42u8; 32]);
        assert!(matches!(
            vault.decrypt("not base64!!").unwrap_err(),
            SecretError::Malformed(_)
        ));
        assert!(matches!(
            vault.decrypt(&STANDARD.encode([1u8; 8])).unwrap_err(),
            SecretError::Malformed(_)
        ));
    }

    #[test]
    fn test_context_binding() {
        let vault = SecretVault::new([42u8; 32]);
        let blob = vault.encrypt_bound("secret", "ontology-a").unwrap();
        assert_eq!(
            vault.decrypt_bound(&blob, "ontology-a").unwrap().as_str(),
            "secret"
        );
        assert_eq!(
            vault.decrypt_bound(&blob, "ontology-b").unwrap_err(),
            SecretError::Decryption
        );
    }

    #[test]
    fn test_previous_key_still_decrypts() {
        let old = SecretVault::new([7u8; 32]);
        let blob = old.encrypt("rotated").unwrap();

        let rotated = SecretVault::new([8u8; 32]).with_previous_key([7u8; 32]);
        assert_eq!(rotated.decrypt(&blob).unwrap().as_str(), "rotated");

        let fresh = rotated.encrypt("rotated").unwrap();
        assert_eq!(old.decrypt(&fresh).unwrap_err(), SecretError::Decryption);
    }

    #[test]
    fn test_from_settings() {
        let settings = VaultSettings {
            key: generate_key(),
            previous_keys: vec![generate_key()],
        };
        let vault = SecretVault::from_settings(&settings).unwrap();
        let blob = vault.encrypt("x").unwrap();
        assert_eq!(vault.decrypt(&blob).unwrap().as_str(), "x");

        let missing = VaultSettings::default();
        assert!(matches!(
            SecretVault::from_settings(&missing).unwrap_err(),
            SecretError::InvalidKey(_)
        ));
    }

    #[test]
    fn test_short_key_rejected() {
        let short = STANDARD.encode([0u8; 16]);
        assert!(matches!(
            SecretVault::from_base64(&short).unwrap_err(),
            SecretError::InvalidKey(_)
        ));
    }
}
