use clap::Parser;
use emg_daemon::{Cli, RelayServer};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emg_daemon=info,emg_relay=info,pipeline=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("EMG relay starting...");

    let config = Cli::parse().into_config()?;
    let server = RelayServer::bind(config).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received. Stopping services..."),
            Err(e) => tracing::error!("Could not listen for shutdown signal: {}", e),
        }
        signal.cancel();
    });

    server.run(shutdown).await?;
    tracing::info!("EMG relay stopped gracefully.");
    Ok(())
}
