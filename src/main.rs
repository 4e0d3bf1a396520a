// ABOUTME: Entry point for the vnctunnel CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use vnctunnel::config::{self, Profile};
use vnctunnel::error::Result;
use vnctunnel::ssh::RusshTransport;
use vnctunnel::tunnel::{ErrorKind, TunnelSession, verify_host_key};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { host, user, force } => {
            let cwd = env::current_dir()?;
            config::init_profile(&cwd, host.as_deref(), user.as_deref(), force)
        }
        Commands::Fingerprint => {
            let profile = load_profile(cli.profile.as_deref())?;
            fingerprint(profile).await
        }
        Commands::Connect => {
            let profile = load_profile(cli.profile.as_deref())?;
            connect(profile).await
        }
    }
}

fn load_profile(path: Option<&Path>) -> Result<Profile> {
    match path {
        Some(path) => Profile::load(path),
        None => Profile::discover(&env::current_dir()?),
    }
}

/// Print the server's host key in every form a user may need to pin it.
async fn fingerprint(profile: Profile) -> Result<()> {
    let params = profile.connection_parameters()?;
    let trusted = params.trusted_host_key.clone();
    let mut session = TunnelSession::new(params, RusshTransport::new(profile.transport_config()));

    println!(
        "  → Connecting to {}:{}...",
        profile.ssh.host, profile.ssh.port
    );
    let host_key = session.inspect_host_key().await?;

    println!("Key type:    {}", host_key.algorithm());
    println!("Fingerprint: {}", host_key.hex_fingerprint());
    println!("             {}", host_key.sha256_fingerprint());
    println!("host_key:    {}", host_key.encoded());

    if verify_host_key(&trusted, &host_key) {
        println!("  ✓ Matches the trusted host key in the profile");
    } else {
        println!("  ! Not trusted yet; copy host_key into the profile to pin it");
    }

    Ok(())
}

/// Establish the tunnel and hold it open until Ctrl-C.
async fn connect(profile: Profile) -> Result<()> {
    let params = profile.connection_parameters()?;
    let transport = RusshTransport::new(profile.transport_config());
    let mut session =
        TunnelSession::new(params, transport).max_port_attempts(profile.tunnel.max_port_attempts);

    println!(
        "  → Connecting to {}:{}...",
        profile.ssh.host, profile.ssh.port
    );

    let port = match session.establish().await {
        Ok(port) => port,
        Err(e) => {
            if e.kind() == ErrorKind::Security {
                if let Some(signature) = session.host_key_signature() {
                    eprintln!("  Server presented host key {}", signature);
                }
            }
            return Err(e.into());
        }
    };

    println!(
        "  ✓ Forwarding {}:{} -> {}:{} (press Ctrl-C to stop)",
        profile.tunnel.bind_address, port, profile.target.host, profile.target.port
    );

    tokio::signal::ctrl_c().await?;

    println!("  → Closing tunnel...");
    session.terminate().await?;
    Ok(())
}
