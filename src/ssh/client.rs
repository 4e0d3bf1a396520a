// ABOUTME: russh-backed transport implementation.
// ABOUTME: Handles connection, method discovery, authentication, forwarding, and exec.

use super::error::{Error, Result};
use super::forward::{ForwardHandle, start_forward};
use super::transport::{AuthMethod, Challenge, ChallengeResponder, Prompt, Transport};
use crate::tunnel::{HostKey, KeyPair};
use async_trait::async_trait;
use parking_lot::Mutex;
use russh::client::{self, AuthResult, Config, Handle, KeyboardInteractiveAuthResponse, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKeyBase64, ssh_key};
use russh::{Channel, Disconnect, MethodKind};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Connection settings for the russh transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// SSH server host.
    pub host: String,
    /// SSH server port (default: 22).
    pub port: u16,
    /// Address local forwarders bind to (default: 127.0.0.1).
    pub bind_address: IpAddr,
    /// Close the connection after this long without traffic.
    pub inactivity_timeout: Option<Duration>,
    /// Interval between keepalive requests.
    pub keepalive_interval: Option<Duration>,
}

impl TransportConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            inactivity_timeout: None,
            keepalive_interval: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    pub fn inactivity_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }
}

/// russh client handler.
///
/// Accepts every server key and records it; the tunnel compares it against
/// the pinned value once the handshake is done.
pub struct TunnelHandler {
    server_key: Arc<Mutex<Option<HostKey>>>,
}

impl client::Handler for TunnelHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let host_key = HostKey::new(
            server_public_key.algorithm().as_str(),
            server_public_key.public_key_bytes(),
        );
        *self.server_key.lock() = Some(host_key);
        Ok(true)
    }
}

/// What the server answered to the `none` auth request.
enum Offered {
    /// `none` was accepted; the user is already authenticated.
    All,
    Methods(Vec<MethodKind>),
}

/// Transport over a russh client session.
pub struct RusshTransport {
    config: TransportConfig,
    handle: Option<Arc<Handle<TunnelHandler>>>,
    server_key: Arc<Mutex<Option<HostKey>>>,
    offered: Option<Offered>,
    authenticated: bool,
    forwarders: Vec<ForwardHandle>,
    exec_channels: Vec<Channel<Msg>>,
}

impl std::fmt::Debug for RusshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshTransport")
            .field("config", &self.config)
            .field("connected", &self.handle.is_some())
            .field("authenticated", &self.authenticated)
            .field("forwarders", &self.forwarders.len())
            .finish()
    }
}

impl RusshTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            handle: None,
            server_key: Arc::new(Mutex::new(None)),
            offered: None,
            authenticated: false,
            forwarders: Vec::new(),
            exec_channels: Vec::new(),
        }
    }

    /// Local ports currently being forwarded.
    pub fn forwarded_ports(&self) -> Vec<u16> {
        self.forwarders.iter().map(ForwardHandle::port).collect()
    }

    /// Exclusive access to the session handle.
    ///
    /// Authentication needs `&mut Handle`, which is only available until the
    /// first forwarder clones the `Arc`.
    fn handle_mut(&mut self) -> Result<&mut Handle<TunnelHandler>> {
        let handle = self.handle.as_mut().ok_or(Error::NotConnected)?;
        Arc::get_mut(handle).ok_or(Error::SessionShared)
    }

    /// Stop forwarders, drop exec channels and disconnect the current session.
    async fn disconnect(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or(Error::NotConnected)?;

        for forwarder in self.forwarders.drain(..) {
            forwarder.stop().await;
        }
        self.exec_channels.clear();
        self.offered = None;
        self.authenticated = false;

        handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

fn method_kind(method: AuthMethod) -> MethodKind {
    match method {
        AuthMethod::Password => MethodKind::Password,
        AuthMethod::PublicKey => MethodKind::PublicKey,
        AuthMethod::KeyboardInteractive => MethodKind::KeyboardInteractive,
    }
}

#[async_trait]
impl Transport for RusshTransport {
    async fn connect(&mut self) -> Result<HostKey> {
        if self.handle.is_some() {
            tracing::debug!(
                "Closing previous session to {}:{} before reconnecting",
                self.config.host,
                self.config.port
            );
            if let Err(e) = self.disconnect().await {
                tracing::debug!("Error closing previous session: {}", e);
            }
        }

        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| {
                Error::Connection(format!("{}:{}: {}", self.config.host, self.config.port, e))
            })?;
        stream.set_nodelay(true)?;

        let russh_config = Config {
            inactivity_timeout: self.config.inactivity_timeout,
            keepalive_interval: self.config.keepalive_interval,
            ..Default::default()
        };

        let handler = TunnelHandler {
            server_key: Arc::clone(&self.server_key),
        };

        let handle = client::connect_stream(Arc::new(russh_config), stream, handler)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let host_key = self
            .server_key
            .lock()
            .take()
            .ok_or_else(|| Error::Connection("server did not present a host key".to_string()))?;

        tracing::debug!(
            "Connected to {}:{} ({})",
            self.config.host,
            self.config.port,
            host_key.algorithm()
        );

        self.handle = Some(Arc::new(handle));
        self.offered = None;
        self.authenticated = false;
        Ok(host_key)
    }

    async fn is_auth_method_available(&mut self, user: &str, method: AuthMethod) -> Result<bool> {
        if self.offered.is_none() {
            let result = self.handle_mut()?.authenticate_none(user).await?;
            let offered = if let AuthResult::Failure {
                remaining_methods, ..
            } = result
            {
                Offered::Methods(remaining_methods.iter().copied().collect())
            } else {
                tracing::warn!("Server accepted \"none\" authentication for {}", user);
                self.authenticated = true;
                Offered::All
            };
            self.offered = Some(offered);
        }

        Ok(match &self.offered {
            Some(Offered::All) => true,
            Some(Offered::Methods(methods)) => methods.contains(&method_kind(method)),
            None => false,
        })
    }

    async fn authenticate_with_password(&mut self, user: &str, password: &str) -> Result<bool> {
        if self.authenticated {
            return Ok(true);
        }
        let result = self
            .handle_mut()?
            .authenticate_password(user, password)
            .await?;
        self.authenticated = result.success();
        Ok(self.authenticated)
    }

    async fn authenticate_with_keyboard_interactive(
        &mut self,
        user: &str,
        responder: &ChallengeResponder,
    ) -> Result<bool> {
        if self.authenticated {
            return Ok(true);
        }

        let handle = self.handle_mut()?;
        let mut response = handle
            .authenticate_keyboard_interactive_start(user, None::<String>)
            .await?;

        let authenticated = loop {
            match response {
                KeyboardInteractiveAuthResponse::Success => break true,
                KeyboardInteractiveAuthResponse::Failure { .. } => break false,
                KeyboardInteractiveAuthResponse::InfoRequest {
                    name,
                    instructions,
                    prompts,
                } => {
                    let challenge = Challenge {
                        name,
                        instructions,
                        prompts: prompts
                            .into_iter()
                            .map(|p| Prompt {
                                text: p.prompt,
                                echo: p.echo,
                            })
                            .collect(),
                    };
                    let responses = responder(&challenge);
                    response = handle
                        .authenticate_keyboard_interactive_respond(responses)
                        .await?;
                }
            }
        };

        self.authenticated = authenticated;
        Ok(authenticated)
    }

    async fn authenticate_with_public_key(
        &mut self,
        user: &str,
        key_pair: KeyPair,
    ) -> Result<bool> {
        if self.authenticated {
            return Ok(true);
        }

        let handle = self.handle_mut()?;
        let hash_alg = handle.best_supported_rsa_hash().await?.flatten();

        let result = handle
            .authenticate_publickey(
                user,
                PrivateKeyWithHashAlg::new(key_pair.into_private_key(), hash_alg),
            )
            .await?;

        self.authenticated = result.success();
        Ok(self.authenticated)
    }

    async fn create_local_port_forwarder(
        &mut self,
        local_port: u16,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<()> {
        let handle = Arc::clone(self.handle.as_ref().ok_or(Error::NotConnected)?);
        let forwarder = start_forward(
            handle,
            self.config.bind_address,
            local_port,
            remote_host.to_string(),
            remote_port,
        )
        .await?;
        self.forwarders.push(forwarder);
        Ok(())
    }

    async fn exec_command(&mut self, command: &str) -> Result<()> {
        let handle = self.handle.as_ref().ok_or(Error::NotConnected)?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        // Keep the channel open until the transport closes.
        self.exec_channels.push(channel);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.disconnect().await
    }
}
