use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use image_builder_gateway::config::load_config;
use image_builder_gateway::lifecycle::{build_state, signals, Shutdown};
use image_builder_gateway::observability::logging::init_logging;
use image_builder_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "image-builder-gateway", version)]
#[command(about = "Request admission for the image builder API", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "IMAGE_BUILDER_CONFIG")]
    config: Option<PathBuf>,

    /// Load and validate everything, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "image-builder-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        route_prefix = %config.routing.route_prefix(),
        distributions_dir = %config.access.distributions_dir,
        allow_file = ?config.access.allow_file,
        "Configuration loaded"
    );

    let started = build_state(&config)?;

    if cli.check {
        tracing::info!("Configuration check passed");
        return Ok(());
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = GatewayServer::new(started.state);
    server.run(listener, shutdown.wait()).await?;

    drop(started.watcher);
    tracing::info!("Shutdown complete");
    Ok(())
}
