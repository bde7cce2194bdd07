//! In-process publish/subscribe registry.
//!
//! The bus is a cheap, cloneable handle. Every clone shares one registry of
//! subscriptions keyed by [`EventKind`].
//!
//! # Delivery rules
//!
//! - `publish` is synchronous. Subscribers run on the publishing thread, in
//!   the order they subscribed, before `publish` returns.
//! - Each callback is isolated. An `Err` return or a panic is logged and
//!   counted, and delivery continues with the next subscriber.
//! - The registry lock is never held while callbacks run, so a callback may
//!   subscribe, unsubscribe or publish again.
//! - Subscribers needing async work must hand it off themselves (for example
//!   to a channel drained by a tokio task).
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use tally_core::event::{AppEvent, ComponentEvent, EventKind};
//! use tally_core::event_bus::EventBus;
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! let subscription = bus.subscribe(EventKind::ComponentInitialized, Some("audit"), move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! let event = AppEvent::Component(ComponentEvent::Initialized { name: "database".into() });
//! assert!(bus.publish(&event));
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//!
//! subscription.unsubscribe();
//! assert!(!bus.publish(&event));
//! ```

use crate::event::{AppEvent, EventKind};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{trace, warn};

/// Error type returned by subscriber callbacks.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Callback = Arc<dyn Fn(&AppEvent) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    id: u64,
    context: Option<String>,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<EventKind, Vec<Entry>>>,
}

impl BusInner {
    fn remove(&self, kind: EventKind, id: u64) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(entries) = subscribers.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            subscribers.remove(&kind);
        }
        removed
    }
}

/// Shared publish/subscribe registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for events of `kind`.
    ///
    /// `context` names the owner of the subscription and shows up in logs
    /// when the callback fails. The returned [`Subscription`] removes exactly
    /// this registration.
    pub fn subscribe<F>(&self, kind: EventKind, context: Option<&str>, callback: F) -> Subscription
    where
        F: Fn(&AppEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            context: context.map(str::to_string),
            callback: Arc::new(callback),
        };

        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(entry);

        trace!(event = %kind, subscription = id, context = ?context, "Subscribed");

        Subscription {
            id,
            kind,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `event` to every subscriber of its kind.
    ///
    /// Returns `false`, invoking nothing, when the kind has no subscribers.
    pub fn publish(&self, event: &AppEvent) -> bool {
        let kind = event.kind();

        // Snapshot so callbacks run without the lock held.
        let entries: Vec<Entry> = {
            let subscribers = self
                .inner
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match subscribers.get(&kind) {
                Some(entries) if !entries.is_empty() => entries.clone(),
                _ => return false,
            }
        };

        metrics::counter!("event_bus_events_published_total", "event" => kind.as_str())
            .increment(1);

        for entry in &entries {
            let outcome = catch_unwind(AssertUnwindSafe(|| (entry.callback)(event)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            metrics::counter!("event_bus_subscriber_failures_total", "event" => kind.as_str())
                .increment(1);
            warn!(
                event = %kind,
                subscription = entry.id,
                context = entry.context.as_deref().unwrap_or("anonymous"),
                error = %failure,
                "Event subscriber failed"
            );
        }

        true
    }

    /// Number of live subscriptions for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Removes every subscription of every kind.
    pub fn clear(&self) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Removes every subscription of `kind`.
    pub fn clear_kind(&self, kind: EventKind) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind);
    }

    /// A handle that does not keep the registry alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("EventBus").field("kinds", &kinds).finish()
    }
}

/// Non-owning bus handle, for callbacks that publish back onto the bus that
/// holds them.
#[derive(Clone, Debug, Default)]
pub struct WeakEventBus {
    inner: Weak<BusInner>,
}

impl WeakEventBus {
    /// Returns the bus if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<EventBus> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}

impl fmt::Debug for BusInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusInner").finish_non_exhaustive()
    }
}

/// Handle to one registration created by [`EventBus::subscribe`].
///
/// Dropping the handle does not unsubscribe.
#[derive(Clone, Debug)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// The kind this subscription listens to.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Removes this registration. Returns whether anything was removed;
    /// calling it again is a no-op.
    pub fn unsubscribe(&self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|inner| inner.remove(self.kind, self.id))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::event::{AppLifecycleEvent, ComponentEvent};
    use std::sync::Mutex;

    fn initialized(name: &str) -> AppEvent {
        AppEvent::Component(ComponentEvent::Initialized { name: name.into() })
    }

    // ========== Delivery ==========

    #[test]
    fn publish_without_subscribers_returns_false() {
        let bus = EventBus::new();
        assert!(!bus.publish(&initialized("database")));
    }

    #[test]
    fn subscribers_run_in_subscription_order_exactly_once() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let calls = Arc::clone(&calls);
            bus.subscribe(EventKind::ComponentInitialized, None, move |_| {
                calls.lock().unwrap().push(label);
                Ok(())
            });
        }

        assert!(bus.publish(&initialized("x")));
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn events_are_routed_by_kind() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&calls);
        bus.subscribe(EventKind::AppShutdown, None, move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });

        assert!(!bus.publish(&initialized("x")));
        assert!(bus.publish(&AppEvent::App(AppLifecycleEvent::Shutdown {
            timestamp: chrono::Utc::now(),
        })));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    // ========== Unsubscribe ==========

    #[test]
    fn unsubscribe_removes_only_that_registration() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let first_calls = Arc::clone(&calls);
        let first = bus.subscribe(EventKind::ComponentInitialized, None, move |_| {
            first_calls.lock().unwrap().push("first");
            Ok(())
        });
        let second_calls = Arc::clone(&calls);
        bus.subscribe(EventKind::ComponentInitialized, None, move |_| {
            second_calls.lock().unwrap().push("second");
            Ok(())
        });

        assert!(first.unsubscribe());
        assert!(!first.unsubscribe());
        assert_eq!(bus.subscriber_count(EventKind::ComponentInitialized), 1);

        bus.publish(&initialized("x"));
        assert_eq!(*calls.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn clear_kind_leaves_other_kinds() {
        let bus = EventBus::new();
        bus.subscribe(EventKind::ComponentInitialized, None, |_| Ok(()));
        bus.subscribe(EventKind::AppShutdown, None, |_| Ok(()));

        bus.clear_kind(EventKind::ComponentInitialized);
        assert_eq!(bus.subscriber_count(EventKind::ComponentInitialized), 0);
        assert_eq!(bus.subscriber_count(EventKind::AppShutdown), 1);

        bus.clear();
        assert_eq!(bus.subscriber_count(EventKind::AppShutdown), 0);
    }

    // ========== Isolation ==========

    #[test]
    fn failing_and_panicking_subscribers_do_not_stop_delivery() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(false));

        bus.subscribe(EventKind::ComponentInitialized, Some("broken"), |_| {
            Err("boom".into())
        });
        bus.subscribe(EventKind::ComponentInitialized, Some("panicky"), |_| {
            panic!("subscriber exploded")
        });
        let flag = Arc::clone(&reached);
        bus.subscribe(EventKind::ComponentInitialized, Some("healthy"), move |_| {
            *flag.lock().unwrap() = true;
            Ok(())
        });

        assert!(bus.publish(&initialized("x")));
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn callbacks_may_reenter_the_bus() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        let calls = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&calls);
        bus.subscribe(EventKind::ComponentInitialized, None, move |_| {
            let counter = Arc::clone(&counter);
            inner_bus.subscribe(EventKind::AppShutdown, None, move |_| {
                *counter.lock().unwrap() += 1;
                Ok(())
            });
            Ok(())
        });

        bus.publish(&initialized("x"));
        bus.publish(&AppEvent::App(AppLifecycleEvent::Shutdown {
            timestamp: chrono::Utc::now(),
        }));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn weak_handle_does_not_outlive_bus() {
        let bus = EventBus::new();
        let weak = bus.downgrade();
        assert!(weak.upgrade().is_some());
        drop(bus);
        assert!(weak.upgrade().is_none());
    }
}
