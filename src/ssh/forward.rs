// ABOUTME: Local TCP port forwarding over an SSH session.
// ABOUTME: Accepts local connections and relays each over a direct-tcpip channel.

use super::client::TunnelHandler;
use super::error::{Error, Result};
use russh::client::Handle;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

/// Handle for a running local forwarder.
pub struct ForwardHandle {
    /// Address the local listener is bound to.
    pub local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    shutdown_complete: Arc<Notify>,
}

impl ForwardHandle {
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting new connections.
    ///
    /// Connections already being relayed finish on their own once either
    /// side closes.
    pub async fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        tokio::select! {
            _ = self.shutdown_complete.notified() => {}
            _ = tokio::time::sleep(tokio::time::Duration::from_secs(2)) => {}
        }
    }
}

impl Drop for ForwardHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Bind `bind_address:local_port` and relay every accepted connection to
/// `remote_host:remote_port` through the session.
///
/// Fails with `Error::ForwardFailed` when the local port cannot be bound.
pub async fn start_forward(
    handle: Arc<Handle<TunnelHandler>>,
    bind_address: IpAddr,
    local_port: u16,
    remote_host: String,
    remote_port: u16,
) -> Result<ForwardHandle> {
    let listener = TcpListener::bind((bind_address, local_port))
        .await
        .map_err(|e| Error::ForwardFailed {
            port: local_port,
            reason: e.to_string(),
        })?;
    let local_addr = listener.local_addr()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_complete = Arc::new(Notify::new());

    tracing::info!(
        "Forwarding {} -> {}:{} through SSH",
        local_addr,
        remote_host,
        remote_port
    );

    tokio::spawn(run_forwarder(
        listener,
        handle,
        remote_host,
        remote_port,
        shutdown.clone(),
        shutdown_complete.clone(),
    ));

    Ok(ForwardHandle {
        local_addr,
        shutdown,
        shutdown_complete,
    })
}

async fn run_forwarder(
    listener: TcpListener,
    handle: Arc<Handle<TunnelHandler>>,
    remote_host: String,
    remote_port: u16,
    shutdown: Arc<AtomicBool>,
    shutdown_complete: Arc<Notify>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        // Accept with timeout to check shutdown flag periodically
        let accept_result = tokio::select! {
            result = listener.accept() => result,
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => continue,
        };

        match accept_result {
            Ok((stream, peer)) => {
                let handle = Arc::clone(&handle);
                let remote_host = remote_host.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        forward_connection(stream, peer, &handle, &remote_host, remote_port).await
                    {
                        tracing::debug!("Forward connection error from {}: {}", peer, e);
                    }
                });
            }
            Err(e) => {
                if !shutdown.load(Ordering::SeqCst) {
                    tracing::warn!("Accept error on forwarded port: {}", e);
                }
                break;
            }
        }
    }

    shutdown_complete.notify_one();
}

async fn forward_connection(
    mut local_stream: TcpStream,
    peer: SocketAddr,
    handle: &Handle<TunnelHandler>,
    remote_host: &str,
    remote_port: u16,
) -> Result<()> {
    local_stream.set_nodelay(true)?;

    let channel = handle
        .channel_open_direct_tcpip(
            remote_host,
            u32::from(remote_port),
            peer.ip().to_string(),
            u32::from(peer.port()),
        )
        .await?;

    let mut channel_stream = channel.into_stream();
    let (sent, received) = copy_bidirectional(&mut local_stream, &mut channel_stream).await?;

    tracing::debug!(
        "Forwarded connection from {} closed: {} bytes sent, {} bytes received",
        peer,
        sent,
        received
    );

    Ok(())
}
