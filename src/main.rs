//! sub-stub server binary.
//!
//! Startup order: config, logging, metrics, caches, service, listener.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use sub_stub::config::load_config;
use sub_stub::lifecycle::{shutdown_signal, Shutdown};
use sub_stub::observability::{logging, metrics};
use sub_stub::{CacheSet, ConfigService, HttpServer};

#[derive(Parser)]
#[command(name = "sub-stub", version)]
#[command(about = "Serves per-user proxy client configurations", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "substub.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    logging::init_tracing(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sub-stub starting");
    tracing::info!(
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        base_dir = %config.paths.base_dir.display(),
        request_timeout_secs = config.listener.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let caches = Arc::new(CacheSet::new());
    let service = Arc::new(ConfigService::from_config(&config, caches)?);

    // Surface data problems at startup rather than on the first request.
    match service.users() {
        Ok(users) => tracing::info!(users = users.len(), "User table loaded"),
        Err(e) => tracing::warn!(error = %e, "User table unavailable"),
    }
    match service.servers() {
        Ok(servers) => tracing::info!(servers = servers.len(), "Server registry loaded"),
        Err(e) => tracing::warn!(error = %e, "Server registry unavailable"),
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server = HttpServer::new(config, service)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
