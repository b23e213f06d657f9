//! Ephemera node entry point
//!
//! Run with:
//! ```bash
//! cargo run -p ephemera-service --bin ephemera-node
//! ```
//!
//! Configuration is loaded from environment variables.

use ephemera_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use ephemera_service::{ChannelService, ServiceContext};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Configuration decides the log format, so it is loaded first
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Node failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        name = %config.app.name,
        env = ?config.app.env,
        backend = ?config.backend,
        ttl_secs = config.channel.ttl_secs,
        "Starting Ephemera node..."
    );

    let ctx = ServiceContext::from_config(&config).await.map_err(|e| {
        error!(error = %e, code = e.error_code(), "Failed to build service context");
        e
    })?;
    let service = ChannelService::new(&ctx);

    info!("Node ready, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    service.shutdown();
    Ok(())
}
