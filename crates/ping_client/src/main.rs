use ping_client::Error;
use ping_client::client::PongClient;
use ping_client::config::PingConfig;
use ping_client::scheduler::AdmissionScheduler;
use rate_limiter_shared::cross_process::CrossProcessLimiter;
use rate_limiter_shared::shared_counter::SharedCounterStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PingConfig::from_env()?;
    let limiter = CrossProcessLimiter::new(
        SharedCounterStore::new(&config.lock_file_path),
        config.window,
    )?;
    let client = PongClient::from_config(&config)?;

    tracing::info!(
        app_name = %config.app_name,
        pong = %client.hello_url(),
        lock_file = %config.lock_file_path.display(),
        "PingService started"
    );

    let scheduler = AdmissionScheduler::new(limiter, client, config.scheduler_settings())?;
    scheduler
        .run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "Failed to listen for Ctrl-C");
            }
        })
        .await;

    Ok(())
}
