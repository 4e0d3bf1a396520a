// ABOUTME: Library root for vnctunnel - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod error;
pub mod ssh;
pub mod tunnel;
