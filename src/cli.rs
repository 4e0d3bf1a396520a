// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vnctunnel")]
#[command(about = "Forward a remote display port through an SSH tunnel")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the connection profile (default: discovered in the current directory)
    #[arg(short, long, global = true)]
    pub profile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new vnctunnel.yml connection profile
    Init {
        /// SSH server host
        #[arg(long)]
        host: Option<String>,

        /// SSH username
        #[arg(long)]
        user: Option<String>,

        /// Overwrite an existing profile
        #[arg(short, long)]
        force: bool,
    },

    /// Show the SSH server's host key so it can be pinned in the profile
    Fingerprint,

    /// Establish the tunnel and keep it open until interrupted
    Connect,
}
