//! Ontograph Vault: credential encryption at rest.
//!
//! Graph database passwords are sealed with AES-256-GCM under a key held in
//! process configuration. A sealed blob is base64 text:
//!
//! ```text
//! version (1 byte) || nonce (12 bytes) || ciphertext + tag
//! ```
//!
//! The key never travels with the blob. Decryption with a different key, a
//! different context, or a corrupted blob fails with [`SecretError`].

mod cipher;

pub use cipher::{generate_key, SecretVault};

use thiserror::Error;

/// Errors from vault operations. Messages never include plaintext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("Invalid vault key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Decryption failed: wrong key, wrong context, or corrupted data")]
    Decryption,

    #[error("Malformed secret blob: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, SecretError>;
