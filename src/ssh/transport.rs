// ABOUTME: Transport capability trait consumed by the tunnel orchestration.
// ABOUTME: Abstracts the SSH engine behind connect, auth, forward, exec, and close.

use super::error::Result;
use crate::tunnel::{HostKey, KeyPair};
use async_trait::async_trait;
use std::fmt;

/// Authentication methods the tunnel cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    Password,
    PublicKey,
    KeyboardInteractive,
}

impl AuthMethod {
    /// Wire name of the method as advertised by SSH servers.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Password => "password",
            AuthMethod::PublicKey => "publickey",
            AuthMethod::KeyboardInteractive => "keyboard-interactive",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single prompt inside a keyboard-interactive round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub echo: bool,
}

/// One keyboard-interactive info request from the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Challenge {
    pub name: String,
    pub instructions: String,
    pub prompts: Vec<Prompt>,
}

/// Answers a keyboard-interactive challenge, one response per prompt.
///
/// Invoked synchronously by the transport while authenticating, so it must
/// return immediately.
pub type ChallengeResponder = dyn Fn(&Challenge) -> Vec<String> + Send + Sync;

/// The SSH engine the tunnel is orchestrated over.
///
/// Implementations own the network connection, the handshake, and any
/// forwarding listeners they create. Errors are returned as-is; deciding
/// which of them are fatal is up to the caller.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection and complete the handshake.
    /// Returns the host key the server presented. A session that is already
    /// open is closed first, along with its forwarders.
    async fn connect(&mut self) -> Result<HostKey>;

    /// Whether the server offers `method` for `user`. Only valid after `connect`.
    async fn is_auth_method_available(&mut self, user: &str, method: AuthMethod) -> Result<bool>;

    async fn authenticate_with_password(&mut self, user: &str, password: &str) -> Result<bool>;

    async fn authenticate_with_keyboard_interactive(
        &mut self,
        user: &str,
        responder: &ChallengeResponder,
    ) -> Result<bool>;

    /// Present a decrypted key pair. The key pair is consumed by the attempt.
    async fn authenticate_with_public_key(&mut self, user: &str, key_pair: KeyPair)
    -> Result<bool>;

    /// Bind `local_port` and relay accepted connections to `remote_host:remote_port`.
    async fn create_local_port_forwarder(
        &mut self,
        local_port: u16,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<()>;

    /// Start `command` on a fresh session channel without waiting for it.
    async fn exec_command(&mut self, command: &str) -> Result<()>;

    /// Stop forwarders and close the connection.
    async fn close(&mut self) -> Result<()>;
}
