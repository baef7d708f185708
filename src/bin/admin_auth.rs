//! Admin authentication state management
//!
//! Inspects and resets the persisted admin login state (attempt counter,
//! lockout deadline, session marker) without going through the HTTP API.
//! A running server keeps its own copy in memory; changes made here are
//! picked up on its next start.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rapidx_site::{
    auth::{Authenticator, AuthPhase, CredentialVerifier, FileStore, SystemClock},
    logging, ServerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Admin authentication state management
#[derive(Parser, Debug)]
#[command(name = "rapidx-admin-auth")]
#[command(about = "Inspect or reset the persisted admin login state")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file providing the auth policy and state path
    #[arg(short, long, global = true, env = "RAPIDX_CONFIG")]
    config: Option<PathBuf>,

    /// State file, overrides the configuration
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show attempts, lockout, and session
    Status,

    /// Clear the attempt counter and any lockout
    Unlock,

    /// End the active admin session
    Logout,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        ServerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(state) = cli.state {
        config.state.path = state;
    }
    config.auth.validate().context("Invalid auth policy")?;
    let _log_guard = logging::init(&config.logging, cli.debug)?;

    let store = FileStore::open(&config.state.path).with_context(|| {
        format!("Failed to open state file {}", config.state.path.display())
    })?;
    let mut authenticator = Authenticator::load(
        config.auth.clone(),
        CredentialVerifier::from_config(&config.credential),
        Arc::new(store),
        Arc::new(SystemClock),
    );

    match cli.command {
        Commands::Status => print_status(&authenticator, &config),
        Commands::Unlock => {
            authenticator.unlock();
            info!("Admin login unlocked");
            println!("✅ Attempt counter and lockout cleared");
        }
        Commands::Logout => {
            authenticator.logout();
            println!("✅ Admin session cleared");
        }
    }
    Ok(())
}

fn print_status(authenticator: &Authenticator, config: &ServerConfig) {
    let state = authenticator.state();
    let policy = authenticator.policy();

    println!("State file:       {}", config.state.path.display());
    println!(
        "Phase:            {}",
        match state.phase() {
            AuthPhase::Unauthenticated => "unauthenticated",
            AuthPhase::Authenticated => "authenticated",
            AuthPhase::LockedOut => "locked out",
        }
    );
    println!(
        "Failed attempts:  {} of {}",
        state.failed_attempts, policy.max_attempts
    );
    if let Some(deadline) = state.lockout_deadline.filter(|_| state.locked_out) {
        println!("Locked until:     {}", deadline.to_rfc3339());
    }
    if let Some(deadline) = state.session_deadline {
        println!(
            "Session expires:  {} ({}s left)",
            deadline.to_rfc3339(),
            authenticator.remaining_session_time().as_secs()
        );
    }
}
