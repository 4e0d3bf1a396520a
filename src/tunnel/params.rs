// ABOUTME: Immutable connection parameters for one tunnel.
// ABOUTME: Built from a stored profile; empty strings mean "not set" for secrets.

use std::fmt;

/// Which authentication family the profile asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Password, falling back to keyboard-interactive.
    Password,
    /// Stored private key.
    PublicKey,
}

/// Everything needed to establish a tunnel.
#[derive(Clone)]
pub struct ConnectionParameters {
    pub ssh_host: String,
    pub ssh_port: u16,
    pub user: String,
    pub password: String,
    pub passphrase: String,
    /// Previously trusted host key, base64 or raw.
    pub trusted_host_key: String,
    pub target_host: String,
    pub target_port: u16,
    pub use_public_key: bool,
    /// Private key text, possibly encrypted, possibly empty.
    pub private_key: String,
    /// First local port to try. Defaults to the target port.
    pub local_port: Option<u16>,
}

impl ConnectionParameters {
    pub fn new(
        ssh_host: impl Into<String>,
        user: impl Into<String>,
        target_host: impl Into<String>,
        target_port: u16,
    ) -> Self {
        Self {
            ssh_host: ssh_host.into(),
            ssh_port: 22,
            user: user.into(),
            password: String::new(),
            passphrase: String::new(),
            trusted_host_key: String::new(),
            target_host: target_host.into(),
            target_port,
            use_public_key: false,
            private_key: String::new(),
            local_port: None,
        }
    }

    pub fn ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn trusted_host_key(mut self, host_key: impl Into<String>) -> Self {
        self.trusted_host_key = host_key.into();
        self
    }

    /// Switch to public-key authentication with the given key text.
    pub fn private_key(mut self, key: impl Into<String>, passphrase: impl Into<String>) -> Self {
        self.use_public_key = true;
        self.private_key = key.into();
        self.passphrase = passphrase.into();
        self
    }

    pub fn local_port(mut self, port: u16) -> Self {
        self.local_port = Some(port);
        self
    }

    pub fn auth_mode(&self) -> AuthMode {
        if self.use_public_key {
            AuthMode::PublicKey
        } else {
            AuthMode::Password
        }
    }

    /// Where the local port search starts.
    pub fn preferred_local_port(&self) -> u16 {
        self.local_port.unwrap_or(self.target_port)
    }
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("ssh_host", &self.ssh_host)
            .field("ssh_port", &self.ssh_port)
            .field("user", &self.user)
            .field("target_host", &self.target_host)
            .field("target_port", &self.target_port)
            .field("auth_mode", &self.auth_mode())
            .field("local_port", &self.local_port)
            .finish_non_exhaustive()
    }
}
