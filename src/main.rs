//! Chat Relay - Entry Point
//!
//! Binds the listener and runs the relay on a single control thread.

use std::env;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::{RelayConfig, RelayServer};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging with environment filter
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // Usage: chat_relay [bind_addr] [--no-console]
    let config = RelayConfig::from_args(env::args());

    let server = match RelayServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start relay: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Ok(addr) = server.local_addr() {
        info!("Chat relay listening on {}", addr);
    }

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            shutdown.shutdown();
        }
    });

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Relay stopped on fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}
