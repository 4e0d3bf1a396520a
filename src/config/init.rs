// ABOUTME: Profile scaffolding for new connections.
// ABOUTME: Creates vnctunnel.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{PROFILE_FILENAME, Profile};

pub fn init_profile(
    dir: &Path,
    host: Option<&str>,
    user: Option<&str>,
    force: bool,
) -> Result<()> {
    let profile_path = dir.join(PROFILE_FILENAME);

    if profile_path.exists() && !force {
        return Err(Error::AlreadyExists(profile_path));
    }

    let mut profile = Profile::template();

    if let Some(h) = host {
        if h.trim().is_empty() {
            return Err(Error::InvalidConfig("host cannot be empty".to_string()));
        }
        profile.ssh.host = h.to_string();
    }

    if let Some(u) = user {
        if u.trim().is_empty() {
            return Err(Error::InvalidConfig("user cannot be empty".to_string()));
        }
        profile.ssh.user = u.to_string();
    }

    let yaml = generate_template_yaml(&profile);
    std::fs::write(&profile_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(profile: &Profile) -> String {
    format!(
        r#"ssh:
  host: {}
  port: {}
  user: {}
  password:
    env: VNCTUNNEL_SSH_PASSWORD
  # Trusted host key (base64). Run `vnctunnel fingerprint` to obtain it.
  host_key: ""
  # Key-pair authentication instead of password
  # use_public_key: true
  # private_key_file: /home/vnc/.ssh/id_ed25519
  # passphrase:
  #   env: VNCTUNNEL_SSH_PASSPHRASE
target:
  host: {}
  port: {}
tunnel:
  bind_address: {}
  max_port_attempts: {}
  # inactivity_timeout: 5m
"#,
        profile.ssh.host,
        profile.ssh.port,
        profile.ssh.user,
        profile.target.host,
        profile.target.port,
        profile.tunnel.bind_address,
        profile.tunnel.max_port_attempts,
    )
}
