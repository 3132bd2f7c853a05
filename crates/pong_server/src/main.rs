use pong_server::app::{PongState, router};
use pong_server::config::PongConfig;
use pong_server::{BindSnafu, Error, ServeSnafu};
use snafu::ResultExt;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PongConfig::from_env()?;
    let app = router(PongState::new(config.bucket)?);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .context(BindSnafu {
            addr: config.bind_addr,
        })?;
    tracing::info!(
        addr = %config.bind_addr,
        permits = config.bucket.get_capacity(),
        refill_ms = config.bucket.refill_interval().as_millis() as u64,
        "Pong listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(ServeSnafu)?;

    tracing::info!("Pong stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for Ctrl-C");
    }
}
