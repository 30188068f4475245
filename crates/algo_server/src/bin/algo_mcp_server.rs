//cargo run --package algo_server --bin algo_mcp_server -- --config server.toml
use std::path::PathBuf;
use std::sync::Arc;

use algo_server::{AlgoMcpServer, ServerConfig, Session};
use algos::{AlgoRegistry, Dispatcher};
use clap::Parser;
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Image analysis MCP server over stdio", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter directive, overrides the config file (RUST_LOG wins over both)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ServerConfig::from_toml_file(path)?,
        None => ServerConfig::default(),
    };

    // Log to stderr, stdout carries the MCP protocol
    let directive = cli
        .log_filter
        .or(config.log_filter.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting image analysis MCP server");

    let registry = Arc::new(AlgoRegistry::builtin()?);
    if config.stardist.is_none() {
        tracing::warn!("No [stardist] section configured, stardist runs will fail");
    }
    let dispatcher = Dispatcher::builder(Arc::clone(&registry))
        .with_builtin(config.stardist)
        .build();
    tracing::info!(algorithms = ?registry.names(), "Algorithm registry ready");

    let server = AlgoMcpServer::new(Arc::new(Session::new(Arc::new(dispatcher))));

    let service = match server.serve(stdio()).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to start MCP server: {:?}", e);
            return Err(e.into());
        }
    };

    tracing::info!("MCP server started, listening on stdio");

    tokio::select! {
        result = service.waiting() => {
            match result {
                Ok(_) => tracing::info!("MCP server completed successfully"),
                Err(e) => {
                    tracing::error!("MCP server error: {:?}", e);
                    return Err(e.into());
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
    }

    tracing::info!("MCP server shut down");
    Ok(())
}
