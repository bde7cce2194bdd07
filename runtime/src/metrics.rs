//! Prometheus metrics export.
//!
//! Metric names recorded across the workspace:
//!
//! | Metric | Kind | Labels |
//! |---|---|---|
//! | `event_bus_events_published_total` | counter | `event` |
//! | `event_bus_subscriber_failures_total` | counter | `event` |
//! | `orchestrator_component_init_duration_seconds` | histogram | `component` |
//! | `goal_achievements_total` | counter | |
//!
//! # Example
//!
//! ```rust,no_run
//! use tally_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to configure the exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install the exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus scrape endpoint.
#[derive(Debug, Clone, Copy)]
pub struct MetricsServer {
    addr: SocketAddr,
}

impl MetricsServer {
    /// Create a server that will listen on `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// The listen address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Installs the global recorder and starts the HTTP listener.
    ///
    /// Must be called from inside a Tokio runtime, at most once per process.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be configured or installed.
    pub fn start(&self) -> Result<(), MetricsError> {
        describe_metrics();

        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        tracing::info!(addr = %self.addr, "Metrics endpoint listening");
        Ok(())
    }
}

/// Registers descriptions for every metric the workspace records.
pub fn describe_metrics() {
    describe_counter!(
        "event_bus_events_published_total",
        "Events published to at least one subscriber"
    );
    describe_counter!(
        "event_bus_subscriber_failures_total",
        "Subscriber callbacks that returned an error or panicked"
    );
    describe_histogram!(
        "orchestrator_component_init_duration_seconds",
        "Time taken by each component's init"
    );
    describe_counter!(
        "goal_achievements_total",
        "Goals that reached their target for the first time"
    );
}
