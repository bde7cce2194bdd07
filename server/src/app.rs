//! Component registration.

use crate::config::{Config, ConfigError, StorageBackend};
use std::sync::Arc;
use tally_core::environment::Clock;
use tally_core::event_bus::EventBus;
use tally_core::query::QueryError;
use tally_runtime::{Orchestrator, OrchestratorError};
use tally_tracker::components::names;
use tally_tracker::{
    AchievementComponent, ActivityComponent, AuthComponent, DatabaseComponent, GoalComponent,
    NotificationComponent,
};
use tally_web::server::{self, HttpServerComponent};
use thiserror::Error;
use tracing::info;

/// Failures while assembling the application.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The database pool could not be created.
    #[error("Failed to create database pool: {0}")]
    Database(#[from] QueryError),

    /// A component could not be registered.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// Registers every component with its dependencies. Nothing is started.
///
/// | Component | Depends on |
/// |---|---|
/// | database | |
/// | auth | database |
/// | activity | database |
/// | goal | database, activity |
/// | achievement | database, goal |
/// | notification | database, achievement |
/// | http | auth, activity, goal, achievement, notification |
///
/// # Errors
///
/// [`StartupError`] when the configuration is unusable or a registration
/// is rejected.
pub fn build_orchestrator(
    config: &Config,
    bus: EventBus,
    clock: Arc<dyn Clock>,
) -> Result<Orchestrator, StartupError> {
    let offset = config.utc_offset()?;
    let http_addr = config.http_addr()?;

    let database = match config.database.storage {
        StorageBackend::Postgres => DatabaseComponent::postgres(bus.clone(), &config.postgres())?,
        StorageBackend::Memory => DatabaseComponent::in_memory(bus.clone()),
    }
    .with_retry(config.connect_retry());
    info!(storage = ?config.database.storage, "Storage selected");

    let mut orchestrator = Orchestrator::new(bus.clone(), Arc::clone(&clock));
    let health = orchestrator.health_monitor();
    orchestrator
        .register(names::DATABASE, Arc::new(database), &[])?
        .register(
            names::AUTH,
            Arc::new(AuthComponent::new(bus.clone(), Arc::clone(&clock))),
            &[names::DATABASE],
        )?
        .register(
            names::ACTIVITY,
            Arc::new(ActivityComponent::new(bus.clone(), Arc::clone(&clock))),
            &[names::DATABASE],
        )?
        .register(
            names::GOAL,
            Arc::new(GoalComponent::new(bus.clone(), Arc::clone(&clock)).with_offset(offset)),
            &[names::DATABASE, names::ACTIVITY],
        )?
        .register(
            names::ACHIEVEMENT,
            Arc::new(AchievementComponent::new(bus.clone(), Arc::clone(&clock))),
            &[names::DATABASE, names::GOAL],
        )?
        .register(
            names::NOTIFICATION,
            Arc::new(NotificationComponent::new(bus.clone(), clock)),
            &[names::DATABASE, names::ACHIEVEMENT],
        )?
        .register(
            server::NAME,
            Arc::new(HttpServerComponent::new(bus, http_addr, health)),
            &server::DEPENDENCIES,
        )?;
    Ok(orchestrator)
}
