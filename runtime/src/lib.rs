//! # Tally Runtime
//!
//! Drives the component lifecycle for the Tally tracker.
//!
//! - [`orchestrator::Orchestrator`]: registration, dependency-ordered
//!   startup, reverse-order shutdown
//! - [`health::HealthMonitor`]: shared application and component health
//! - [`retry`]: exponential backoff for startup connectivity checks
//! - [`metrics`]: Prometheus exporter and metric descriptions
//! - [`signal::wait_for_signal`]: Ctrl+C / SIGTERM

pub mod health;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod signal;

pub use health::{AppStatus, ComponentHealth, HealthMonitor, HealthRecord, HealthSnapshot};
pub use orchestrator::{Orchestrator, OrchestratorError, resolve_init_order};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use signal::wait_for_signal;
