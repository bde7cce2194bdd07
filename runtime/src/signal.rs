//! Process signal handling for graceful shutdown.

use tracing::{info, warn};

/// Waits for Ctrl+C or, on Unix, SIGTERM.
///
/// Use this in `main()` between startup and shutdown:
///
/// ```ignore
/// orchestrator.init().await?;
/// wait_for_signal().await;
/// orchestrator.shutdown().await.ok();
/// ```
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => log_ctrl_c(result),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to register SIGTERM handler, waiting for Ctrl+C only");
                log_ctrl_c(tokio::signal::ctrl_c().await);
            }
        }
    }

    #[cfg(not(unix))]
    {
        log_ctrl_c(tokio::signal::ctrl_c().await);
    }
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Received Ctrl+C"),
        Err(err) => warn!(error = %err, "Failed to listen for Ctrl+C, shutting down"),
    }
}
