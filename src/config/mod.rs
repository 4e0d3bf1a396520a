// ABOUTME: Connection profile types and parsing for vnctunnel.yml.
// ABOUTME: Handles YAML parsing, secret resolution, and conversion to tunnel parameters.

mod init;
mod secret;

pub use init::init_profile;
pub use secret::{SecretValue, resolve_or_empty};

use crate::error::{Error, Result};
use crate::ssh::TransportConfig;
use crate::tunnel::{ConnectionParameters, DEFAULT_PORT_ATTEMPTS};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROFILE_FILENAME: &str = "vnctunnel.yml";
pub const PROFILE_FILENAME_ALT: &str = "vnctunnel.yaml";
pub const PROFILE_FILENAME_DIR: &str = ".vnctunnel/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub ssh: SshProfile,
    pub target: TargetProfile,
    #[serde(default)]
    pub tunnel: TunnelProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshProfile {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<SecretValue>,
    #[serde(default)]
    pub passphrase: Option<SecretValue>,
    /// Trusted host key; empty until the user pins one.
    #[serde(default)]
    pub host_key: String,
    #[serde(default)]
    pub use_public_key: bool,
    #[serde(default)]
    pub private_key: Option<SecretValue>,
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetProfile {
    #[serde(default = "default_target_host")]
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TunnelProfile {
    #[serde(default)]
    pub local_port: Option<u16>,
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "default_max_port_attempts")]
    pub max_port_attempts: u32,
    #[serde(default, with = "humantime_serde")]
    pub inactivity_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub keepalive_interval: Option<Duration>,
}

impl Default for TunnelProfile {
    fn default() -> Self {
        Self {
            local_port: None,
            bind_address: default_bind_address(),
            max_port_attempts: default_max_port_attempts(),
            inactivity_timeout: None,
            keepalive_interval: None,
        }
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn default_target_host() -> String {
    "localhost".to_string()
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_max_port_attempts() -> u32 {
    DEFAULT_PORT_ATTEMPTS
}

impl Profile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let profile: Profile = serde_yaml::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(PROFILE_FILENAME),
            dir.join(PROFILE_FILENAME_ALT),
            dir.join(PROFILE_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.ssh.host.trim().is_empty() {
            return Err(Error::InvalidConfig("ssh.host cannot be empty".to_string()));
        }
        if self.ssh.user.trim().is_empty() {
            return Err(Error::InvalidConfig("ssh.user cannot be empty".to_string()));
        }
        if self.ssh.private_key.is_some() && self.ssh.private_key_file.is_some() {
            return Err(Error::InvalidConfig(
                "set either ssh.private_key or ssh.private_key_file, not both".to_string(),
            ));
        }
        if self.tunnel.max_port_attempts == 0 {
            return Err(Error::InvalidConfig(
                "tunnel.max_port_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve secrets and key material into tunnel parameters.
    pub fn connection_parameters(&self) -> Result<ConnectionParameters> {
        let private_key = match &self.ssh.private_key_file {
            Some(path) => std::fs::read_to_string(path)?,
            None => resolve_or_empty(self.ssh.private_key.as_ref())?,
        };

        Ok(ConnectionParameters {
            ssh_host: self.ssh.host.clone(),
            ssh_port: self.ssh.port,
            user: self.ssh.user.clone(),
            password: resolve_or_empty(self.ssh.password.as_ref())?,
            passphrase: resolve_or_empty(self.ssh.passphrase.as_ref())?,
            trusted_host_key: self.ssh.host_key.clone(),
            target_host: self.target.host.clone(),
            target_port: self.target.port,
            use_public_key: self.ssh.use_public_key,
            private_key,
            local_port: self.tunnel.local_port,
        })
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(&self.ssh.host)
            .port(self.ssh.port)
            .bind_address(self.tunnel.bind_address)
            .inactivity_timeout(self.tunnel.inactivity_timeout)
            .keepalive_interval(self.tunnel.keepalive_interval)
    }

    pub fn template() -> Self {
        Profile {
            ssh: SshProfile {
                host: "ssh.example.com".to_string(),
                port: default_ssh_port(),
                user: "vnc".to_string(),
                password: Some(SecretValue::FromEnv {
                    var: "VNCTUNNEL_SSH_PASSWORD".to_string(),
                    default: None,
                }),
                passphrase: None,
                host_key: String::new(),
                use_public_key: false,
                private_key: None,
                private_key_file: None,
            },
            target: TargetProfile {
                host: default_target_host(),
                port: 5900,
            },
            tunnel: TunnelProfile::default(),
        }
    }
}
