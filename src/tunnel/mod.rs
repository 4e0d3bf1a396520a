// ABOUTME: Tunnel establishment: host key trust, credentials, auth, and port allocation.
// ABOUTME: Orchestrates an ssh::Transport through a fixed sequence of phases.

mod auth;
mod credential;
mod error;
mod forward;
mod host_key;
mod params;
mod session;
mod state;

pub use auth::{
    authenticate_with_password, authenticate_with_public_key, password_responder,
    query_auth_methods,
};
pub use credential::{CredentialError, KeyPair, decrypt_and_recover_key_pair, is_encrypted};
pub use error::{Error, ErrorKind, Result};
pub use forward::{DEFAULT_PORT_ATTEMPTS, allocate_port_forward};
pub use host_key::{HostKey, verify_host_key};
pub use params::{AuthMode, ConnectionParameters};
pub use session::TunnelSession;
pub use state::{
    AuthCapabilityChecked, AuthMethods, Authenticated, Connected, Forwarding, NotConnected, Phase,
    PhaseMarker, SessionState,
};
