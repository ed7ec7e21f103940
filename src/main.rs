//! Google Drive MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) server for Google Drive, served over
//! HTTP + Server-Sent Events.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};

use gdrive_mcp_server_rust::config::{Config, ServerConfig};
use gdrive_mcp_server_rust::gdrive::auth::Authenticator;
use gdrive_mcp_server_rust::transport::{self, AccessGate, Application};

/// Google Drive MCP Server
#[derive(Parser)]
#[command(name = "gdrive-mcp-server")]
#[command(author, version, about = "Google Drive MCP Server - A Model Context Protocol server for Google Drive")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the SSE server (default)
    Serve {
        /// Bind address (overrides MCP_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides MCP_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Authenticate with Google Drive (run this first)
    Auth,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::new().context("Failed to load configuration")?;

    match cli.command {
        Some(Commands::Auth) => {
            let authenticator = Authenticator::new(config).await?;
            authenticator.authenticate_interactive().await?;
            eprintln!("Authentication completed successfully!");
            Ok(())
        }
        Some(Commands::Serve { host, port }) => run_server(config, host, port).await,
        None => run_server(config, None, None).await,
    }
}

async fn run_server(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut server_config = ServerConfig::from_env().context("Invalid server configuration")?;
    if let Some(host) = host {
        server_config.host = host;
    }
    if let Some(port) = port {
        server_config.port = port;
    }

    if AccessGate::new(server_config.api_key.clone()).is_open() {
        warn!("No API key configured. Set MCP_API_KEY for security.");
    } else {
        info!("API key authentication enabled");
    }

    let app = Application::build(config, &server_config).await?;

    if app.authenticator.acquire_quiet().await.is_none() {
        warn!("No stored credentials. Run 'gdrive-mcp-server auth' before calling tools.");
    }

    let refresh = app
        .authenticator
        .clone()
        .spawn_refresh_task(server_config.refresh_interval);

    let bind_addr = server_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    let result = transport::serve(listener, app.router, &app.state, shutdown_signal()).await;
    refresh.abort();
    result?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
