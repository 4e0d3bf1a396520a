// ABOUTME: Transport-level error types.
// ABOUTME: Covers connection, protocol, forwarding, and remote command failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("transport is not connected")]
    NotConnected,

    #[error("session handle is shared with active forwarders")]
    SessionShared,

    #[error("failed to forward local port {port}: {reason}")]
    ForwardFailed { port: u16, reason: String },

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
