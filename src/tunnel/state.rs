// ABOUTME: Per-attempt session state, typed by establishment phase.
// ABOUTME: Each transition consumes the state and returns the next phase.

use super::credential::{CredentialError, KeyPair, decrypt_and_recover_key_pair};
use super::error::Error;
use super::host_key::HostKey;
use super::params::AuthMode;

/// Observable phase of an establishment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotConnected,
    Connected,
    AuthCapabilityChecked,
    Authenticated,
    Failed,
}

/// Authentication methods the server advertised for the configured user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthMethods {
    pub password: bool,
    pub keyboard_interactive: bool,
    pub public_key: bool,
}

impl AuthMethods {
    pub fn supports_password_family(&self) -> bool {
        self.password || self.keyboard_interactive
    }
}

/// Nothing negotiated yet.
#[derive(Debug, Default)]
pub struct NotConnected;

/// Handshake done; host key and advertised methods are known.
#[derive(Debug)]
pub struct Connected {
    host_key: HostKey,
    methods: AuthMethods,
}

/// The server can serve the requested auth family.
#[derive(Debug)]
pub struct AuthCapabilityChecked {
    host_key: HostKey,
    methods: AuthMethods,
    mode: AuthMode,
    key_pair: Option<KeyPair>,
}

/// Authenticated. Terminal success for the auth state machine.
#[derive(Debug)]
pub struct Authenticated {
    host_key: HostKey,
}

/// Authenticated and a local forwarder is bound.
#[derive(Debug)]
pub struct Forwarding {
    host_key: HostKey,
    local_port: u16,
}

pub trait PhaseMarker {
    const PHASE: Phase;
}

impl PhaseMarker for NotConnected {
    const PHASE: Phase = Phase::NotConnected;
}
impl PhaseMarker for Connected {
    const PHASE: Phase = Phase::Connected;
}
impl PhaseMarker for AuthCapabilityChecked {
    const PHASE: Phase = Phase::AuthCapabilityChecked;
}
impl PhaseMarker for Authenticated {
    const PHASE: Phase = Phase::Authenticated;
}
impl PhaseMarker for Forwarding {
    const PHASE: Phase = Phase::Authenticated;
}

/// State of one establishment attempt.
///
/// Owned exclusively by the attempt and moved through the phases; reading
/// advertised methods before connecting does not type-check.
#[derive(Debug)]
pub struct SessionState<S> {
    state: S,
}

impl<S: PhaseMarker> SessionState<S> {
    pub fn phase(&self) -> Phase {
        S::PHASE
    }
}

impl SessionState<NotConnected> {
    pub fn new() -> Self {
        Self {
            state: NotConnected,
        }
    }

    pub fn connected(self, host_key: HostKey, methods: AuthMethods) -> SessionState<Connected> {
        SessionState {
            state: Connected { host_key, methods },
        }
    }
}

impl Default for SessionState<NotConnected> {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState<Connected> {
    pub fn host_key(&self) -> &HostKey {
        &self.state.host_key
    }

    pub fn auth_methods(&self) -> AuthMethods {
        self.state.methods
    }

    /// Check that the server offers what `mode` needs.
    ///
    /// `host` is only used to name the server in the error.
    pub fn check_capability(
        self,
        mode: AuthMode,
        host: &str,
    ) -> Result<SessionState<AuthCapabilityChecked>, Error> {
        let methods = self.state.methods;
        match mode {
            AuthMode::Password if !methods.supports_password_family() => {
                return Err(Error::PasswordMethodsUnsupported {
                    host: host.to_string(),
                });
            }
            AuthMode::PublicKey if !methods.public_key => {
                return Err(Error::PublicKeyUnsupported {
                    host: host.to_string(),
                });
            }
            _ => {}
        }

        Ok(SessionState {
            state: AuthCapabilityChecked {
                host_key: self.state.host_key,
                methods,
                mode,
                key_pair: None,
            },
        })
    }
}

impl SessionState<AuthCapabilityChecked> {
    pub fn host_key(&self) -> &HostKey {
        &self.state.host_key
    }

    pub fn auth_methods(&self) -> AuthMethods {
        self.state.methods
    }

    pub fn mode(&self) -> AuthMode {
        self.state.mode
    }

    /// Decrypt the stored key and hold it for the coming attempt.
    ///
    /// Safe to call again after a failure, e.g. with a corrected passphrase.
    pub fn resolve_key_pair(&mut self, blob: &str, passphrase: &str) -> Result<(), CredentialError> {
        self.state.key_pair = Some(decrypt_and_recover_key_pair(blob, passphrase)?);
        Ok(())
    }

    pub fn has_key_pair(&self) -> bool {
        self.state.key_pair.is_some()
    }

    /// Take the key pair out for its single use.
    pub fn take_key_pair(&mut self) -> Option<KeyPair> {
        self.state.key_pair.take()
    }

    pub fn authenticated(self) -> SessionState<Authenticated> {
        SessionState {
            state: Authenticated {
                host_key: self.state.host_key,
            },
        }
    }
}

impl SessionState<Authenticated> {
    pub fn host_key(&self) -> &HostKey {
        &self.state.host_key
    }

    pub fn forwarding(self, local_port: u16) -> SessionState<Forwarding> {
        SessionState {
            state: Forwarding {
                host_key: self.state.host_key,
                local_port,
            },
        }
    }
}

impl SessionState<Forwarding> {
    pub fn host_key(&self) -> &HostKey {
        &self.state.host_key
    }

    pub fn local_port(&self) -> u16 {
        self.state.local_port
    }
}
