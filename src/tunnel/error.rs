// ABOUTME: User-facing failures of tunnel establishment.
// ABOUTME: Each variant maps to one of six categories the caller can act on.

use super::credential::CredentialError;
use thiserror::Error;

/// Category of an establishment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Security,
    Capability,
    Credential,
    Authentication,
    ResourceExhaustion,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "failed to connect to SSH server {host}:{port}; check the network connection and the SSH server address and port"
    )]
    Connect { host: String, port: u16 },

    #[error(
        "the host key of {host} has changed; if this is intentional, delete and recreate the connection, otherwise this may be a man-in-the-middle attack"
    )]
    HostKeyMismatch { host: String },

    #[error(
        "SSH server {host} supports neither \"password\" nor \"keyboard-interactive\" auth methods; allow at least one of the two and try again"
    )]
    PasswordMethodsUnsupported { host: String },

    #[error(
        "SSH server {host} does not support the \"publickey\" auth method required for key-pair authentication; allow publickey authentication and try again"
    )]
    PublicKeyUnsupported { host: String },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(
        "failed to authenticate to {host} as {user} with a password; check the SSH username and password"
    )]
    PasswordRejected { host: String, user: String },

    #[error(
        "failed to authenticate to {host} as {user} with a key-pair; check the SSH username and that the public key is in authorized_keys on the server"
    )]
    PublicKeyRejected { host: String, user: String },

    #[error(
        "could not forward a local port to {remote_host}:{remote_port} after {attempts} attempts starting at {start}; ensure the SSH server allows port forwarding"
    )]
    PortForwardExhausted {
        remote_host: String,
        remote_port: u16,
        start: u16,
        attempts: u32,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connect { .. } => ErrorKind::Network,
            Error::HostKeyMismatch { .. } => ErrorKind::Security,
            Error::PasswordMethodsUnsupported { .. } | Error::PublicKeyUnsupported { .. } => {
                ErrorKind::Capability
            }
            Error::Credential(_) => ErrorKind::Credential,
            Error::PasswordRejected { .. } | Error::PublicKeyRejected { .. } => {
                ErrorKind::Authentication
            }
            Error::PortForwardExhausted { .. } => ErrorKind::ResourceExhaustion,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
