//! MCP server binary entry point.

use anyhow::Result;
use calc_mcp_server::{
    config::{ServerConfig, TransportKind},
    http::{HttpTransport, RunningServer, StreamableHttpTransport},
    protocol::McpServerBuilder,
    tools::create_registry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    info!(
        transport = config.transport.as_str(),
        "Starting {} v{}", config.name, config.version
    );

    let registry = Arc::new(create_registry());
    info!("Registered {} tools", registry.len());

    let server = McpServerBuilder::new()
        .registry(registry)
        .name(config.name.to_string())
        .version(config.version.to_string())
        .build()?;

    match config.transport {
        TransportKind::Stdio => {
            info!("MCP server ready on stdio");
            server.run().await?;
        }
        TransportKind::Http => {
            let running = HttpTransport::new(server.dispatcher(), config.http.clone())
                .start()
                .await?;
            serve_until_signal(running, config.http.shutdown_timeout).await?;
        }
        TransportKind::Streamable => {
            let running = StreamableHttpTransport::new(server.dispatcher(), config.http.clone())
                .start()
                .await?;
            serve_until_signal(running, config.http.shutdown_timeout).await?;
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn serve_until_signal(running: RunningServer, deadline: Duration) -> Result<()> {
    info!(addr = %running.local_addr(), "MCP server ready, press Ctrl+C to stop");

    let signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    running.run_until(signal, deadline).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("calc_mcp_server=info,warn"));

    // stdout carries the stdio protocol, so logs always go to stderr.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
        .init();
}
