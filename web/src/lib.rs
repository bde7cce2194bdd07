//! # Tally Web
//!
//! The HTTP API over the tracker components.
//!
//! Handlers call the domain components held in [`AppState`] directly and
//! serialize results as JSON. [`AppError`] maps domain failures to status
//! codes. The acting user comes from the `x-user-id` header
//! ([`ActingUser`]).
//!
//! [`HttpServerComponent`] owns the listener and is registered with the
//! orchestrator like any other component:
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally_core::event_bus::EventBus;
//! use tally_core::environment::SystemClock;
//! use tally_runtime::Orchestrator;
//! use tally_web::server::{DEPENDENCIES, HttpServerComponent, NAME};
//!
//! # fn wire() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = EventBus::new();
//! let mut orchestrator = Orchestrator::new(bus.clone(), Arc::new(SystemClock));
//! // ... register the domain components ...
//! let http = HttpServerComponent::new(bus, "0.0.0.0:8080".parse()?, orchestrator.health_monitor());
//! orchestrator.register(NAME, Arc::new(http), &DEPENDENCIES)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod state;

pub use error::AppError;
pub use extractors::{ActingUser, CorrelationId, USER_ID_HEADER};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use router::router;
pub use server::HttpServerComponent;
pub use state::AppState;
