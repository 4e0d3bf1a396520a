// ABOUTME: In-process SSH server helper for transport integration tests.
// ABOUTME: Runs a russh server on loopback that relays direct-tcpip channels and records requests.

use parking_lot::Mutex;
use russh::keys::{PrivateKey, decode_secret_key};
use russh::server::{self, Auth, Msg, Response, Session};
use russh::{Channel, ChannelId, MethodKind, MethodSet};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use vnctunnel::ssh::TransportConfig;

pub const TEST_USER: &str = "alice";
pub const TEST_PASSWORD: &str = "secret";

/// How the server authenticates clients.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Methods advertised when `none` auth is rejected.
    pub methods: Vec<MethodKind>,
    pub accept_none: bool,
    pub accept_password: bool,
    /// Prompts sent in each keyboard-interactive round.
    pub challenge_rounds: Vec<Vec<(&'static str, bool)>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            methods: vec![MethodKind::Password, MethodKind::KeyboardInteractive],
            accept_none: false,
            accept_password: true,
            challenge_rounds: vec![vec![("Password: ", false)]],
        }
    }
}

/// What the server saw from its clients.
#[derive(Debug, Default)]
pub struct ServerLog {
    pub connections: usize,
    pub password_attempts: Vec<String>,
    /// Responses received, one entry per keyboard-interactive round.
    pub challenge_responses: Vec<Vec<String>>,
    pub direct_tcpip: Vec<(String, u32)>,
    pub exec: Vec<String>,
}

/// A running server bound to an ephemeral loopback port.
pub struct SshServer {
    pub addr: SocketAddr,
    pub host_key: PrivateKey,
    pub log: Arc<Mutex<ServerLog>>,
}

impl SshServer {
    pub async fn start(options: ServerOptions) -> Self {
        let host_key = decode_secret_key(&super::fixture("id_ed25519"), None)
            .expect("fixture key should decode");

        let config = Arc::new(server::Config {
            methods: MethodSet::from(options.methods.as_slice()),
            auth_rejection_time: Duration::from_millis(10),
            auth_rejection_time_initial: Some(Duration::ZERO),
            keys: vec![host_key.clone()],
            ..Default::default()
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind server port");
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(ServerLog::default()));
        let options = Arc::new(options);

        let accept_log = Arc::clone(&log);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_log.lock().connections += 1;
                let handler = TestHandler {
                    options: Arc::clone(&options),
                    log: Arc::clone(&accept_log),
                    round: 0,
                };
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    if let Ok(session) = server::run_stream(config, stream, handler).await {
                        let _ = session.await;
                    }
                });
            }
        });

        Self {
            addr,
            host_key,
            log,
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(self.addr.ip().to_string()).port(self.addr.port())
    }

    /// Host key in the base64 form a profile pins.
    pub fn trusted_host_key(&self) -> String {
        super::fixture("id_ed25519.pub")
            .split_whitespace()
            .nth(1)
            .unwrap()
            .to_string()
    }
}

/// TCP server on loopback that echoes every byte back.
pub async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind echo port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.into_split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

struct TestHandler {
    options: Arc<ServerOptions>,
    log: Arc<Mutex<ServerLog>>,
    round: usize,
}

impl TestHandler {
    fn challenge(&self, round: usize) -> Auth {
        let prompts: Vec<(Cow<'static, str>, bool)> = self.options.challenge_rounds[round]
            .iter()
            .map(|(text, echo)| (Cow::Borrowed(*text), *echo))
            .collect();
        Auth::Partial {
            name: Cow::Borrowed("login"),
            instructions: Cow::Borrowed(""),
            prompts: Cow::Owned(prompts),
        }
    }
}

impl server::Handler for TestHandler {
    type Error = russh::Error;

    async fn auth_none(&mut self, user: &str) -> Result<Auth, Self::Error> {
        if self.options.accept_none && user == TEST_USER {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::reject())
        }
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        self.log.lock().password_attempts.push(password.to_string());
        if self.options.accept_password && user == TEST_USER && password == TEST_PASSWORD {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::reject())
        }
    }

    async fn auth_keyboard_interactive<'a>(
        &'a mut self,
        user: &str,
        _submethods: &str,
        response: Option<Response<'a>>,
    ) -> Result<Auth, Self::Error> {
        let Some(response) = response else {
            self.round = 0;
            return Ok(self.challenge(0));
        };

        let answers: Vec<String> = response
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .collect();
        let expected = self.options.challenge_rounds[self.round].len();
        let correct = user == TEST_USER
            && answers.len() == expected
            && answers.iter().all(|a| a == TEST_PASSWORD);
        self.log.lock().challenge_responses.push(answers);

        if !correct {
            return Ok(Auth::reject());
        }
        self.round += 1;
        if self.round < self.options.challenge_rounds.len() {
            Ok(self.challenge(self.round))
        } else {
            Ok(Auth::Accept)
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.log
            .lock()
            .exec
            .push(String::from_utf8_lossy(data).into_owned());
        session.channel_success(channel)?;
        Ok(())
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.log
            .lock()
            .direct_tcpip
            .push((host_to_connect.to_string(), port_to_connect));

        let target = format!("{}:{}", host_to_connect, port_to_connect);
        tokio::spawn(async move {
            let Ok(mut upstream) = TcpStream::connect(target).await else {
                return;
            };
            let mut stream = channel.into_stream();
            let _ = tokio::io::copy_bidirectional(&mut stream, &mut upstream).await;
        });
        Ok(true)
    }
}
