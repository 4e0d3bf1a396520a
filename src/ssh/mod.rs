// ABOUTME: SSH transport layer for the tunnel.
// ABOUTME: Transport trait, russh implementation, and local TCP forwarding.

mod client;
mod error;
mod forward;
mod transport;

pub use client::{RusshTransport, TransportConfig, TunnelHandler};
pub use error::{Error, Result};
pub use forward::ForwardHandle;
pub use transport::{AuthMethod, Challenge, ChallengeResponder, Prompt, Transport};
