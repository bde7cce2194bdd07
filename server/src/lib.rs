//! # Tally Server
//!
//! Configuration and component wiring for the `tally` binary.
//!
//! - [`config`]: [`Config::from_env`](config::Config::from_env) and validation
//! - [`app`]: builds the orchestrator with every component registered

pub mod app;
pub mod config;

pub use app::{StartupError, build_orchestrator};
pub use config::{Config, ConfigError, StorageBackend};
