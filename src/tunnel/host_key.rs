// ABOUTME: Server host key record, trusted-value verification, and fingerprints.
// ABOUTME: Verification accepts either the base64 form or the raw byte form of the key.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64, STANDARD_NO_PAD as BASE64_NO_PAD};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fmt;

/// Host key negotiated during the handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct HostKey {
    algorithm: String,
    bytes: Vec<u8>,
}

impl HostKey {
    pub fn new(algorithm: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: algorithm.into(),
            bytes: bytes.into(),
        }
    }

    /// Algorithm name, e.g. `ssh-ed25519`.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Raw public key blob as sent by the server.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Portable text form used for storage and comparison (standard base64).
    pub fn encoded(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Colon-separated hex MD5 digest of the key blob.
    pub fn hex_fingerprint(&self) -> String {
        let digest = Md5::digest(&self.bytes);
        digest
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// OpenSSH style `SHA256:` fingerprint.
    pub fn sha256_fingerprint(&self) -> String {
        format!("SHA256:{}", BASE64_NO_PAD.encode(Sha256::digest(&self.bytes)))
    }

    /// Fingerprint for display and approval prompts, keyed by algorithm.
    pub fn signature(&self) -> String {
        format!("{} {}", self.algorithm, self.hex_fingerprint())
    }
}

impl fmt::Debug for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostKey")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.sha256_fingerprint())
            .finish()
    }
}

/// Check a previously trusted value against the negotiated host key.
///
/// Older clients stored the key either base64 encoded or as the raw blob, so
/// both comparisons are kept. On the base64 side, CR and LF are dropped
/// before comparing: some clients stored the value wrapped at 76 columns.
/// Any other character, spaces included, must match exactly.
pub fn verify_host_key(trusted: &str, host_key: &HostKey) -> bool {
    let encoded = host_key.encoded();

    let trusted_compact: String = trusted
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n'))
        .collect();
    if !trusted_compact.is_empty() && trusted_compact == encoded {
        return true;
    }

    match BASE64.decode(encoded.as_bytes()) {
        Ok(raw) => trusted.as_bytes() == raw.as_slice(),
        Err(_) => false,
    }
}
