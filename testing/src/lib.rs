//! # Tally Testing
//!
//! Test helpers shared by the Tally crates.
//!
//! - [`mocks::FixedClock`] and [`mocks::test_clock`]: deterministic time
//! - [`EventRecorder`]: captures events published on an [`EventBus`]
//! - [`init_test_tracing`]: routes `tracing` output through the test harness

use std::sync::{Arc, Mutex, PoisonError};
use tally_core::event::{AppEvent, EventKind};
use tally_core::event_bus::{EventBus, Subscription};

pub use chrono::{DateTime, Utc};
pub use tally_core::environment::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, PoisonError, RwLock};

    /// Settable clock for deterministic tests.
    ///
    /// Clones share the same instant, so a test can keep one handle and move
    /// time for every component holding another.
    ///
    /// # Example
    ///
    /// ```
    /// use tally_testing::mocks::FixedClock;
    /// use tally_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    ///
    /// clock.advance(Duration::hours(1));
    /// assert_eq!(clock.now() - time1, Duration::hours(1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a clock frozen at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move the clock forward by `delta`
        pub fn advance(&self, delta: chrono::Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += delta;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC, a Wednesday)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Records every event of the watched kinds, in publish order.
///
/// # Example
///
/// ```
/// use tally_core::event::{AppEvent, ComponentEvent, EventKind};
/// use tally_core::event_bus::EventBus;
/// use tally_testing::EventRecorder;
///
/// let bus = EventBus::new();
/// let recorder = EventRecorder::attach(&bus, &[EventKind::ComponentInitialized]);
///
/// bus.publish(&AppEvent::Component(ComponentEvent::Initialized { name: "db".into() }));
/// assert_eq!(recorder.names(), vec!["component:initialized"]);
/// ```
#[derive(Debug, Clone)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<AppEvent>>>,
    subscriptions: Vec<Subscription>,
}

impl EventRecorder {
    /// Subscribes to each of `kinds` on `bus`.
    #[must_use]
    pub fn attach(bus: &EventBus, kinds: &[EventKind]) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = kinds
            .iter()
            .map(|kind| {
                let sink = Arc::clone(&events);
                bus.subscribe(*kind, Some("event-recorder"), move |event| {
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(event.clone());
                    Ok(())
                })
            })
            .collect();

        Self {
            events,
            subscriptions,
        }
    }

    /// Every recorded event.
    #[must_use]
    pub fn all(&self) -> Vec<AppEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events of `kind`.
    #[must_use]
    pub fn of_kind(&self, kind: EventKind) -> Vec<AppEvent> {
        self.all()
            .into_iter()
            .filter(|event| event.kind() == kind)
            .collect()
    }

    /// Number of recorded events of `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).len()
    }

    /// Names of every recorded event, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.all().iter().map(AppEvent::name).collect()
    }

    /// Forgets everything recorded so far.
    pub fn reset(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Stops recording.
    pub fn detach(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

/// Installs a `tracing` subscriber writing through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::event::{AppLifecycleEvent, ComponentEvent};

    #[test]
    fn recorder_filters_by_kind_and_detaches() {
        let bus = EventBus::new();
        let recorder =
            EventRecorder::attach(&bus, &[EventKind::ComponentInitialized, EventKind::AppShutdown]);

        bus.publish(&AppEvent::Component(ComponentEvent::Initialized { name: "a".into() }));
        bus.publish(&AppEvent::App(AppLifecycleEvent::Shutdown {
            timestamp: Utc::now(),
        }));

        assert_eq!(recorder.names(), vec!["component:initialized", "app:shutdown"]);
        assert_eq!(recorder.count(EventKind::AppShutdown), 1);

        recorder.detach();
        bus.publish(&AppEvent::Component(ComponentEvent::Initialized { name: "b".into() }));
        assert_eq!(recorder.count(EventKind::ComponentInitialized), 1);
    }

    #[test]
    fn shared_clock_handles_move_together() {
        let clock = mocks::test_clock();
        let other = clock.clone();
        clock.advance(chrono::Duration::days(2));
        assert_eq!(other.now().to_rfc3339(), "2025-01-03T00:00:00+00:00");
    }
}
