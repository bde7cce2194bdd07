//! # Tally Tracker
//!
//! The activity-tracking domain: users, activities, logs, goals,
//! achievements and notifications, each served by an orchestrated
//! [`Component`](tally_core::Component).
//!
//! - [`store`]: the [`TrackerStore`](store::TrackerStore) persistence seam,
//!   with SQL and in-memory implementations
//! - [`period`] and [`progress`]: the goal window and progress arithmetic
//! - [`components`]: the domain components and their registration names
//!
//! ## Wiring
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_core::environment::SystemClock;
//! use tally_core::event_bus::EventBus;
//! use tally_runtime::Orchestrator;
//! use tally_tracker::components::{names, ActivityComponent, DatabaseComponent, GoalComponent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = EventBus::new();
//! let clock = Arc::new(SystemClock);
//! let mut orchestrator = Orchestrator::new(bus.clone(), clock.clone());
//! orchestrator
//!     .register(names::DATABASE, Arc::new(DatabaseComponent::in_memory(bus.clone())), &[])?
//!     .register(
//!         names::ACTIVITY,
//!         Arc::new(ActivityComponent::new(bus.clone(), clock.clone())),
//!         &[names::DATABASE],
//!     )?
//!     .register(
//!         names::GOAL,
//!         Arc::new(GoalComponent::new(bus.clone(), clock)),
//!         &[names::DATABASE, names::ACTIVITY],
//!     )?;
//! orchestrator.init().await?;
//! # Ok(())
//! # }
//! ```

pub mod components;
pub mod error;
pub mod model;
pub mod period;
pub mod progress;
pub mod store;

pub use components::{
    AchievementComponent, ActivityComponent, AuthComponent, DatabaseComponent, GoalComponent,
    NotificationComponent,
};
pub use error::{DomainError, StoreError};
pub use period::{PeriodWindow, resolve_window};
pub use progress::{GoalProgress, compute_progress};
pub use store::{InMemoryTrackerStore, SqlTrackerStore, TrackerStore};
