//! RapidXSolution site server - main entry point

use rapidx_site::{
    auth::{self, AuthEvent, SessionTicker},
    config::DatabaseConfig,
    content::{ContentBackend, ContentHub, MemoryBackend},
    http_transport::{AppState, HttpTransportServer},
    logging, Result, ServerConfig,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Site server command line
#[derive(Parser, Debug)]
#[command(name = "rapidx-site")]
#[command(about = "RapidXSolution site service with admin content management")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the public and admin HTTP API
    Serve {
        /// Configuration file (TOML, YAML, or JSON)
        #[arg(short, long, env = "RAPIDX_CONFIG")]
        config: Option<PathBuf>,

        /// Address to bind, overrides the configuration
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on, overrides the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => serve(config, host, port, cli.debug)
            .await
            .context("rapidx-site serve failed"),
    }
}

async fn serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    debug: bool,
) -> Result<()> {
    let mut config = ServerConfig::load(config_path.as_deref())?;
    if let Some(host) = host {
        config.network.host = host;
    }
    if let Some(port) = port {
        config.network.port = port;
    }
    config.validate()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = logging::init(&config.logging, debug)?;
    info!("🚀 Starting RapidXSolution site v{}", env!("CARGO_PKG_VERSION"));

    let authenticator = auth::initialize_auth_system(&config)?;
    let content = ContentHub::new(content_backend(&config.database).await?);

    let ticker = SessionTicker::spawn(authenticator.clone(), config.auth.tick_interval);
    let mut events = ticker.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AuthEvent::SessionExpiring { remaining }) => {
                    info!("Admin session expires in {}s", remaining.as_secs());
                }
                Ok(AuthEvent::SessionExpired) => info!("Admin session expired"),
                Ok(AuthEvent::LockoutExpired) => info!("Admin lockout window ended"),
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {skipped} auth events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        info!("Shutdown requested");
        signal.cancel();
    });

    let server = HttpTransportServer::new(
        config.network.clone(),
        AppState {
            authenticator,
            content,
        },
    );
    let result = server.start(shutdown).await;

    ticker.shutdown().await;
    result
}

async fn content_backend(database: &DatabaseConfig) -> Result<Arc<dyn ContentBackend>> {
    if database.is_in_memory() {
        warn!("No database configured, content is kept in memory only");
        return Ok(Arc::new(MemoryBackend::new()));
    }

    #[cfg(feature = "turso")]
    {
        let backend = rapidx_site::content::TursoBackend::connect(database).await?;
        Ok(Arc::new(backend))
    }

    #[cfg(not(feature = "turso"))]
    {
        Err(rapidx_site::SiteError::config(
            "database.url is set but this build lacks the turso feature",
        ))
    }
}
