use std::time::Duration;

use anyhow::{Context, Result};
use seven_t_api::app::{self, AppState, Integrations};
use seven_t_api::config::Config;
use seven_t_api::jobs::{CampaignDispatchJob, JobScheduler, PlanExpiryJob};
use seven_t_api::middleware::{init_logging, init_metrics};
use tracing::{info, warn};

const JOB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging).context("Failed to initialize logging")?;
    init_metrics().context("Failed to install metrics recorder")?;

    info!("Starting SEVEN T API v{}", env!("CARGO_PKG_VERSION"));

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;

    let addr = config.socket_addr().context("Invalid server address")?;
    let integrations = Integrations::from_config(&config)?;
    let state = AppState::new(config, pool, integrations)?;

    // Recipients left in `sending` by a previous process are failed, never resent.
    match state.campaigns.recover_interrupted().await {
        Ok(report) => info!(
            recipients_failed = report.recipients_failed,
            campaigns_requeued = report.campaigns_requeued,
            "Campaign recovery completed"
        ),
        Err(e) => warn!(error = %e, "Campaign recovery failed"),
    }

    let mut scheduler = JobScheduler::new();
    scheduler.register(CampaignDispatchJob::new(
        state.campaigns.clone(),
        state.config.campaigns.poll_interval_secs,
        state.config.campaigns.batch_size,
    ));
    scheduler.register(PlanExpiryJob::new(state.pool.clone()));
    scheduler.start();

    let app = app::router(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping background jobs...");
    scheduler.shutdown();
    scheduler.wait_for_shutdown(JOB_SHUTDOWN_TIMEOUT).await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
