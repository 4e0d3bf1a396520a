// ABOUTME: Local port selection for the tunnel's forwarding listener.
// ABOUTME: Tries ports linearly from a preferred start within a fixed attempt budget.

use crate::ssh::Transport;

/// Attempts made before giving up on finding a free local port.
pub const DEFAULT_PORT_ATTEMPTS: u32 = 1000;

/// Bind a forwarder on the first free port at or after `start`.
///
/// Every failed bind counts as one attempt and moves on to the next port.
/// Candidates past the top of the port range count as failed attempts; there
/// is no wraparound. Returns `None` once `max_attempts` are used up.
pub async fn allocate_port_forward<T: Transport + ?Sized>(
    transport: &mut T,
    start: u16,
    remote_host: &str,
    remote_port: u16,
    max_attempts: u32,
) -> Option<u16> {
    for attempt in 0..max_attempts {
        let candidate = u32::from(start)
            .checked_add(attempt)
            .and_then(|port| u16::try_from(port).ok());
        let Some(port) = candidate else {
            tracing::debug!("Local port candidate out of range after {} attempts", attempt);
            continue;
        };

        match transport
            .create_local_port_forwarder(port, remote_host, remote_port)
            .await
        {
            Ok(()) => return Some(port),
            Err(e) => tracing::debug!("Local port {} unavailable: {}", port, e),
        }
    }

    None
}
