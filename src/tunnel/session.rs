// ABOUTME: Tunnel establishment over a transport.
// ABOUTME: Drives connect, host key check, capability check, auth, and port forwarding in order.

use super::auth;
use super::credential::CredentialError;
use super::error::{Error, Result};
use super::forward::{DEFAULT_PORT_ATTEMPTS, allocate_port_forward};
use super::host_key::{HostKey, verify_host_key};
use super::params::{AuthMode, ConnectionParameters};
use super::state::{
    AuthCapabilityChecked, Authenticated, Connected, Forwarding, Phase, SessionState,
};
use crate::ssh::{self, Transport};
use std::time::Duration;

/// One tunnel: a transport plus the parameters it was built from.
#[derive(Debug)]
pub struct TunnelSession<T> {
    params: ConnectionParameters,
    transport: T,
    max_port_attempts: u32,
    phase: Phase,
    host_key: Option<HostKey>,
    local_port: Option<u16>,
}

impl<T: Transport> TunnelSession<T> {
    pub fn new(params: ConnectionParameters, transport: T) -> Self {
        Self {
            params,
            transport,
            max_port_attempts: DEFAULT_PORT_ATTEMPTS,
            phase: Phase::NotConnected,
            host_key: None,
            local_port: None,
        }
    }

    /// Override how many local ports are tried before giving up.
    pub fn max_port_attempts(mut self, attempts: u32) -> Self {
        self.max_port_attempts = attempts;
        self
    }

    pub fn params(&self) -> &ConnectionParameters {
        &self.params
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Host key negotiated by the last connect, whether or not it was trusted.
    pub fn host_key(&self) -> Option<&HostKey> {
        self.host_key.as_ref()
    }

    /// Hex fingerprint of the negotiated host key, for display.
    pub fn host_key_signature(&self) -> Option<String> {
        self.host_key.as_ref().map(HostKey::signature)
    }

    /// Local port of the active forwarder.
    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    /// Establish the tunnel and return the bound local port.
    ///
    /// Stops at the first failing phase. On success the forwarder keeps
    /// running in the background until `terminate`.
    pub async fn establish(&mut self) -> Result<u16> {
        match self.run_phases().await {
            Ok(state) => {
                let port = state.local_port();
                tracing::info!(
                    "Tunnel to {}:{} established on local port {}",
                    self.params.target_host,
                    self.params.target_port,
                    port
                );
                self.local_port = Some(port);
                Ok(port)
            }
            Err(e) => {
                tracing::warn!("Tunnel establishment failed: {}", e);
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self) -> Result<SessionState<Forwarding>> {
        let state = self.connect().await.ok_or_else(|| Error::Connect {
            host: self.params.ssh_host.clone(),
            port: self.params.ssh_port,
        })?;

        if !verify_host_key(&self.params.trusted_host_key, state.host_key()) {
            return Err(Error::HostKeyMismatch {
                host: self.params.ssh_host.clone(),
            });
        }

        let state = state.check_capability(self.params.auth_mode(), &self.params.ssh_host)?;
        self.phase = state.phase();

        let state = self.authenticate(state).await?;
        self.phase = state.phase();

        self.forward(state).await
    }

    /// Open the transport and record the host key and advertised methods.
    ///
    /// Failures are logged and reported as `None`.
    pub async fn connect(&mut self) -> Option<SessionState<Connected>> {
        let host_key = match self.transport.connect().await {
            Ok(host_key) => host_key,
            Err(e) => {
                tracing::warn!(
                    "Failed to connect to {}:{}: {}",
                    self.params.ssh_host,
                    self.params.ssh_port,
                    e
                );
                return None;
            }
        };
        self.host_key = Some(host_key.clone());

        let methods = match auth::query_auth_methods(&mut self.transport, &self.params.user).await
        {
            Ok(methods) => methods,
            Err(e) => {
                tracing::warn!("Failed to query authentication methods: {}", e);
                return None;
            }
        };
        tracing::debug!("Server advertises {:?} for {}", methods, self.params.user);

        let state = SessionState::new().connected(host_key, methods);
        self.phase = state.phase();
        Some(state)
    }

    async fn authenticate(
        &mut self,
        mut state: SessionState<AuthCapabilityChecked>,
    ) -> Result<SessionState<Authenticated>> {
        let user = &self.params.user;

        match state.mode() {
            AuthMode::Password => {
                let authenticated = auth::authenticate_with_password(
                    &mut self.transport,
                    user,
                    &self.params.password,
                    state.auth_methods(),
                )
                .await;
                if !authenticated {
                    return Err(Error::PasswordRejected {
                        host: self.params.ssh_host.clone(),
                        user: user.clone(),
                    });
                }
            }
            AuthMode::PublicKey => {
                state.resolve_key_pair(&self.params.private_key, &self.params.passphrase)?;
                let key_pair = state
                    .take_key_pair()
                    .ok_or(CredentialError::NotGenerated)?;
                if !auth::authenticate_with_public_key(&mut self.transport, user, key_pair).await {
                    return Err(Error::PublicKeyRejected {
                        host: self.params.ssh_host.clone(),
                        user: user.clone(),
                    });
                }
            }
        }

        Ok(state.authenticated())
    }

    async fn forward(
        &mut self,
        state: SessionState<Authenticated>,
    ) -> Result<SessionState<Forwarding>> {
        let start = self.params.preferred_local_port();
        let port = allocate_port_forward(
            &mut self.transport,
            start,
            &self.params.target_host,
            self.params.target_port,
            self.max_port_attempts,
        )
        .await
        .ok_or_else(|| Error::PortForwardExhausted {
            remote_host: self.params.target_host.clone(),
            remote_port: self.params.target_port,
            start,
            attempts: self.max_port_attempts,
        })?;

        Ok(state.forwarding(port))
    }

    /// Connect only long enough to read the server's host key.
    pub async fn inspect_host_key(&mut self) -> Result<HostKey> {
        let host_key = self.transport.connect().await.map_err(|e| {
            tracing::warn!(
                "Failed to connect to {}:{}: {}",
                self.params.ssh_host,
                self.params.ssh_port,
                e
            );
            Error::Connect {
                host: self.params.ssh_host.clone(),
                port: self.params.ssh_port,
            }
        })?;
        self.host_key = Some(host_key.clone());

        if let Err(e) = self.transport.close().await {
            tracing::debug!("Error closing inspection connection: {}", e);
        }
        Ok(host_key)
    }

    /// Run a one-shot command on the server, then wait `wait` before returning.
    ///
    /// Not part of tunnel establishment.
    pub async fn exec_remote_command(&mut self, command: &str, wait: Duration) -> ssh::Result<()> {
        self.transport.exec_command(command).await?;
        tokio::time::sleep(wait).await;
        Ok(())
    }

    /// Close the transport and every forwarder it owns.
    pub async fn terminate(mut self) -> ssh::Result<()> {
        self.transport.close().await
    }
}
