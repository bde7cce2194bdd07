//! Tally HTTP server.

use anyhow::Context as _;
use std::sync::Arc;
use tally_core::environment::{Clock, SystemClock};
use tally_core::event_bus::EventBus;
use tally_runtime::metrics::MetricsServer;
use tally_runtime::wait_for_signal;
use tally_server::{Config, build_orchestrator};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.server.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("Invalid configuration")?;
    info!(
        storage = ?config.database.storage,
        host = %config.server.host,
        port = config.server.port,
        utc_offset_minutes = config.utc_offset_minutes,
        "Configuration loaded"
    );

    if config.metrics.enabled {
        let metrics = MetricsServer::new(config.metrics_addr()?);
        metrics.start().context("Failed to start metrics exporter")?;
        info!(addr = %metrics.addr(), "Metrics exporter listening");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut orchestrator = build_orchestrator(&config, EventBus::new(), clock)?;

    if let Err(err) = orchestrator.init().await {
        error!(error = %err, "Startup failed");
        if let Err(failures) = orchestrator.shutdown().await {
            for failure in failures {
                warn!(failure = %failure, "Cleanup after failed startup was incomplete");
            }
        }
        return Err(err).context("Startup failed");
    }
    info!("Tally is ready");

    wait_for_signal().await;

    match tokio::time::timeout(config.shutdown_timeout(), orchestrator.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(failures)) => {
            for failure in failures {
                warn!(failure = %failure, "Component failed to shut down");
            }
        }
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Shutdown timed out"
        ),
    }
    Ok(())
}
