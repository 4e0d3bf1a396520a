// ABOUTME: Scripted in-memory Transport for tunnel tests.
// ABOUTME: Records every call so tests can assert on order and counts.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use vnctunnel::ssh::{self, AuthMethod, Challenge, ChallengeResponder, Prompt, Transport};
use vnctunnel::tunnel::{AuthMethods, HostKey, KeyPair};

/// A call the tunnel made on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    IsAuthMethodAvailable(AuthMethod),
    Password(String),
    /// Responses the responder gave, one entry per round.
    KeyboardInteractive(Vec<Vec<String>>),
    /// Algorithm of the presented public key.
    PublicKey(String),
    Forward(u16),
    Exec(String),
    Close,
}

/// How the fake server behaves.
#[derive(Debug, Clone)]
pub struct Script {
    pub host_key: HostKey,
    pub connect_fails: bool,
    pub methods: AuthMethods,
    pub accepted_password: Option<String>,
    pub password_errors: bool,
    /// Answer accepted over keyboard-interactive; falls back to `accepted_password`.
    pub accepted_challenge_response: Option<String>,
    /// Prompts sent in each keyboard-interactive round.
    pub challenge_rounds: Vec<Vec<Prompt>>,
    /// Public key (OpenSSH text) the server accepts.
    pub accepted_public_key: Option<String>,
    pub occupied_ports: HashSet<u16>,
    pub all_ports_occupied: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            host_key: sample_host_key(),
            connect_fails: false,
            methods: AuthMethods {
                password: true,
                keyboard_interactive: false,
                public_key: false,
            },
            accepted_password: Some("secret".to_string()),
            password_errors: false,
            accepted_challenge_response: None,
            challenge_rounds: vec![vec![Prompt {
                text: "Password: ".to_string(),
                echo: false,
            }]],
            accepted_public_key: None,
            occupied_ports: HashSet::new(),
            all_ports_occupied: false,
        }
    }
}

pub fn sample_host_key() -> HostKey {
    HostKey::new(
        "ssh-ed25519",
        b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x20abcdefghijklmnopqrstuvwxyz012345".to_vec(),
    )
}

#[derive(Debug)]
pub struct MockTransport {
    script: Script,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared call log that outlives the transport.
    pub fn call_log(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    pub fn forward_attempts(&self) -> usize {
        self.count(|c| matches!(c, Call::Forward(_)))
    }

    pub fn auth_attempts(&self) -> usize {
        self.count(|c| {
            matches!(
                c,
                Call::Password(_) | Call::KeyboardInteractive(_) | Call::PublicKey(_)
            )
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> ssh::Result<HostKey> {
        self.record(Call::Connect);
        if self.script.connect_fails {
            return Err(ssh::Error::Connection("connection refused".to_string()));
        }
        Ok(self.script.host_key.clone())
    }

    async fn is_auth_method_available(
        &mut self,
        _user: &str,
        method: AuthMethod,
    ) -> ssh::Result<bool> {
        self.record(Call::IsAuthMethodAvailable(method));
        let methods = self.script.methods;
        Ok(match method {
            AuthMethod::Password => methods.password,
            AuthMethod::PublicKey => methods.public_key,
            AuthMethod::KeyboardInteractive => methods.keyboard_interactive,
        })
    }

    async fn authenticate_with_password(
        &mut self,
        _user: &str,
        password: &str,
    ) -> ssh::Result<bool> {
        self.record(Call::Password(password.to_string()));
        if self.script.password_errors {
            return Err(ssh::Error::Connection("connection reset".to_string()));
        }
        Ok(self.script.accepted_password.as_deref() == Some(password))
    }

    async fn authenticate_with_keyboard_interactive(
        &mut self,
        _user: &str,
        responder: &ChallengeResponder,
    ) -> ssh::Result<bool> {
        let expected = self
            .script
            .accepted_challenge_response
            .as_deref()
            .or(self.script.accepted_password.as_deref());
        let mut rounds = Vec::new();
        let mut accepted = true;
        for prompts in &self.script.challenge_rounds {
            let challenge = Challenge {
                name: "login".to_string(),
                instructions: String::new(),
                prompts: prompts.clone(),
            };
            let responses = responder(&challenge);
            accepted &= responses.len() == prompts.len()
                && responses
                    .iter()
                    .all(|r| expected == Some(r.as_str()));
            rounds.push(responses);
        }
        self.record(Call::KeyboardInteractive(rounds));
        Ok(accepted)
    }

    async fn authenticate_with_public_key(
        &mut self,
        _user: &str,
        key_pair: KeyPair,
    ) -> ssh::Result<bool> {
        let algorithm = key_pair.public_key().algorithm().as_str().to_string();
        let presented = key_pair.public_key().to_openssh().ok();
        self.record(Call::PublicKey(algorithm));

        let accepted = match (&self.script.accepted_public_key, presented) {
            (Some(accepted), Some(presented)) => {
                accepted.split_whitespace().nth(1) == presented.split_whitespace().nth(1)
            }
            _ => false,
        };
        Ok(accepted)
    }

    async fn create_local_port_forwarder(
        &mut self,
        local_port: u16,
        remote_host: &str,
        _remote_port: u16,
    ) -> ssh::Result<()> {
        self.record(Call::Forward(local_port));
        if self.script.all_ports_occupied || self.script.occupied_ports.contains(&local_port) {
            return Err(ssh::Error::ForwardFailed {
                port: local_port,
                reason: format!("address in use (forwarding to {})", remote_host),
            });
        }
        Ok(())
    }

    async fn exec_command(&mut self, command: &str) -> ssh::Result<()> {
        self.record(Call::Exec(command.to_string()));
        Ok(())
    }

    async fn close(&mut self) -> ssh::Result<()> {
        self.record(Call::Close);
        Ok(())
    }
}
