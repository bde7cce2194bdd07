//! # Tally Core
//!
//! Shared contracts for the Tally activity tracker.
//!
//! This crate owns the pieces every other crate in the workspace agrees on:
//!
//! - **Event bus**: a synchronous, in-process publish/subscribe registry
//!   ([`event_bus::EventBus`]) keyed by [`event::EventKind`].
//! - **Event catalog**: the closed [`event::AppEvent`] sum type with stable
//!   string names such as `"goal:achieved"`.
//! - **Components**: the [`component::Component`] lifecycle contract and the
//!   [`component::ComponentBase`] state every component embeds.
//! - **Query executor**: the [`query::QueryExecutor`] trait the storage layer
//!   talks to.
//! - **Environment**: the [`environment::Clock`] abstraction used to keep time
//!   deterministic in tests.
//!
//! ## Example
//!
//! ```
//! use tally_core::event::{AppEvent, AppLifecycleEvent, EventKind};
//! use tally_core::event_bus::EventBus;
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(EventKind::AppShutdown, None, |event| {
//!     assert_eq!(event.name(), "app:shutdown");
//!     Ok(())
//! });
//!
//! let delivered = bus.publish(&AppEvent::App(AppLifecycleEvent::Shutdown {
//!     timestamp: chrono::Utc::now(),
//! }));
//! assert!(delivered);
//!
//! subscription.unsubscribe();
//! ```

pub mod component;
pub mod event;
pub mod event_bus;
pub mod query;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use component::{
    AsAnyArc, Component, ComponentBase, ComponentError, ErrorPhase, ErrorReporter, Lifecycle,
    LifecycleState,
};
pub use event::{AppEvent, EventKind};
pub use event_bus::{EventBus, HandlerError, Subscription, WeakEventBus};
pub use query::{QueryError, QueryExecutor, QueryResult, Row, RowExt, SqlValue};

/// Environment traits injected into components.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Components never call `Utc::now()` directly; they hold an
    /// `Arc<dyn Clock>` so tests can pin the current instant.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
