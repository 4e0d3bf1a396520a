// ABOUTME: Private key decryption and key pair recovery.
// ABOUTME: Turns a stored, possibly encrypted key blob plus passphrase into a usable key pair.

use russh::keys::{PrivateKey, PublicKey, decode_secret_key};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error(
        "SSH key-pair not generated yet; generate one and put its public part in authorized_keys on the SSH server"
    )]
    NotGenerated,

    #[error("passphrase provided but key-pair is not encrypted; remove the passphrase")]
    PassphraseOnUnencryptedKey,

    #[error("failed to decrypt key-pair; check that the passphrase is entered correctly: {0}")]
    DecryptionFailed(String),
}

/// Decrypted key pair, good for one authentication attempt.
///
/// Neither `Clone` nor serializable.
pub struct KeyPair {
    private: Arc<PrivateKey>,
    public: PublicKey,
}

impl KeyPair {
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    /// Hand the private half to the transport.
    pub fn into_private_key(self) -> Arc<PrivateKey> {
        self.private
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.public.algorithm().as_str())
            .field("private", &"<redacted>")
            .finish()
    }
}

/// Whether the key blob is protected by a passphrase.
///
/// Understands the OpenSSH container as well as legacy PEM headers.
pub fn is_encrypted(blob: &str) -> bool {
    if let Ok(key) = PrivateKey::from_openssh(blob.trim()) {
        return key.is_encrypted();
    }
    blob.contains("Proc-Type: 4,ENCRYPTED") || blob.contains("BEGIN ENCRYPTED PRIVATE KEY")
}

/// Decrypt `blob` with `passphrase` and split it into its two halves.
///
/// An empty passphrase means "no passphrase". Performs no I/O, so a caller
/// can retry after correcting the passphrase.
pub fn decrypt_and_recover_key_pair(
    blob: &str,
    passphrase: &str,
) -> Result<KeyPair, CredentialError> {
    if blob.trim().is_empty() {
        return Err(CredentialError::NotGenerated);
    }

    if !passphrase.is_empty() && !is_encrypted(blob) {
        return Err(CredentialError::PassphraseOnUnencryptedKey);
    }

    let passphrase = (!passphrase.is_empty()).then_some(passphrase);
    let private = decode_secret_key(blob, passphrase)
        .map_err(|e| CredentialError::DecryptionFailed(e.to_string()))?;
    let public = private.public_key().clone();

    Ok(KeyPair {
        private: Arc::new(private),
        public,
    })
}
