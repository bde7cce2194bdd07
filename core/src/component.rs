//! Component lifecycle contract.
//!
//! A component is a long-lived service object with an explicit lifecycle:
//!
//! ```text
//! Uncreated ──▶ Initializing ──▶ Ready ──▶ ShuttingDown ──▶ Stopped
//!                    │             │
//!                    └──▶ Error ◀──┘
//! ```
//!
//! Implementors embed a [`ComponentBase`] and override the [`Component::on_init`]
//! and [`Component::on_shutdown`] hooks. The state machine itself lives in the
//! blanket [`Lifecycle`] implementation so every component transitions the same
//! way.
//!
//! Dependencies are injected by the orchestrator before `init` runs. Inside
//! `on_init`, use [`ComponentBase::require`] to fail loudly when a dependency is
//! absent; [`ComponentBase::dependency`] is the soft lookup.

use crate::event::{AppEvent, ComponentEvent, EventKind};
use crate::event_bus::{EventBus, HandlerError, Subscription};
use crate::query::QueryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Lifecycle states of a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Constructed, never initialized.
    Uncreated,
    /// `on_init` is running.
    Initializing,
    /// Initialized and serving.
    Ready,
    /// `on_shutdown` is running.
    ShuttingDown,
    /// Shut down. May be initialized again.
    Stopped,
    /// Failed during init or while running.
    Error,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uncreated => "uncreated",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Where a component failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPhase {
    /// During `init`.
    Init,
    /// While serving, after a successful init.
    Runtime,
    /// During `shutdown`.
    Shutdown,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Runtime => "runtime",
            Self::Shutdown => "shutdown",
        })
    }
}

/// Errors raised by component lifecycle hooks.
#[derive(Error, Debug)]
pub enum ComponentError {
    /// A required dependency was not injected, or has the wrong type.
    #[error("Component '{component}' requires dependency '{dependency}' which was not provided")]
    MissingDependency {
        /// The component doing the lookup.
        component: String,
        /// The dependency name.
        dependency: String,
    },

    /// The lifecycle method is not valid in the current state.
    #[error("Component '{component}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// The component.
        component: String,
        /// Current state.
        from: LifecycleState,
        /// Requested state.
        to: LifecycleState,
    },

    /// A query against the store failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Binding a network listener or another I/O resource failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else a hook wants to report.
    #[error("{0}")]
    Other(String),
}

impl ComponentError {
    /// Convenience constructor for [`ComponentError::Other`].
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Upcast an `Arc<Self>` to `Arc<dyn Any>` so trait objects can be downcast
/// back to their concrete component type.
pub trait AsAnyArc {
    /// Performs the upcast.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A lifecycle-managed service.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use tally_core::component::{Component, ComponentBase, ComponentError};
/// use tally_core::event_bus::EventBus;
///
/// struct Cache {
///     base: ComponentBase,
/// }
///
/// #[async_trait]
/// impl Component for Cache {
///     fn base(&self) -> &ComponentBase {
///         &self.base
///     }
///
///     async fn on_init(&self) -> Result<(), ComponentError> {
///         Ok(())
///     }
/// }
///
/// let cache = Cache { base: ComponentBase::new("cache", EventBus::new()) };
/// assert_eq!(cache.base().name(), "cache");
/// ```
#[async_trait]
pub trait Component: AsAnyArc + Send + Sync + 'static {
    /// The embedded lifecycle state.
    fn base(&self) -> &ComponentBase;

    /// Acquire resources. Runs once per `init`.
    async fn on_init(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Release resources. Runs once per `shutdown`.
    async fn on_shutdown(&self) -> Result<(), ComponentError> {
        Ok(())
    }
}

/// Lifecycle driver, implemented for every [`Component`].
#[async_trait]
pub trait Lifecycle {
    /// Runs `on_init` and moves to `Ready`, or to `Error` on failure.
    ///
    /// A no-op when already `Ready`.
    ///
    /// # Errors
    ///
    /// Returns the hook's error, or [`ComponentError::InvalidTransition`]
    /// when called mid-transition or after a failure.
    async fn init(&self) -> Result<(), ComponentError>;

    /// Drops bus subscriptions, runs `on_shutdown` and moves to `Stopped`.
    ///
    /// A no-op when already `Stopped`.
    ///
    /// # Errors
    ///
    /// Returns the hook's error. The component is `Stopped` either way.
    async fn shutdown(&self) -> Result<(), ComponentError>;

    /// Current lifecycle state.
    fn state(&self) -> LifecycleState;
}

#[async_trait]
impl<T: Component + ?Sized> Lifecycle for T {
    async fn init(&self) -> Result<(), ComponentError> {
        let base = self.base();
        match base.state() {
            LifecycleState::Ready => return Ok(()),
            LifecycleState::Uncreated | LifecycleState::Stopped => {}
            other => {
                return Err(ComponentError::InvalidTransition {
                    component: base.name().to_string(),
                    from: other,
                    to: LifecycleState::Initializing,
                });
            }
        }

        base.set_state(LifecycleState::Initializing);
        debug!(component = base.name(), "Initializing component");

        match self.on_init().await {
            Ok(()) => {
                base.set_state(LifecycleState::Ready);
                info!(component = base.name(), "Component ready");
                base.publish(&AppEvent::Component(ComponentEvent::Initialized {
                    name: base.name().to_string(),
                }));
                Ok(())
            }
            Err(err) => {
                base.set_state(LifecycleState::Error);
                error!(component = base.name(), error = %err, "Component failed to initialize");
                base.publish(&AppEvent::Component(ComponentEvent::Error {
                    name: base.name().to_string(),
                    error: err.to_string(),
                    phase: ErrorPhase::Init,
                }));
                Err(err)
            }
        }
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        let base = self.base();
        match base.state() {
            LifecycleState::Stopped => return Ok(()),
            LifecycleState::Initializing | LifecycleState::ShuttingDown => {
                return Err(ComponentError::InvalidTransition {
                    component: base.name().to_string(),
                    from: base.state(),
                    to: LifecycleState::ShuttingDown,
                });
            }
            LifecycleState::Uncreated | LifecycleState::Ready | LifecycleState::Error => {}
        }

        base.set_state(LifecycleState::ShuttingDown);
        debug!(component = base.name(), "Shutting down component");
        base.unsubscribe_all();

        let result = self.on_shutdown().await;
        base.set_state(LifecycleState::Stopped);

        if let Err(err) = &result {
            warn!(component = base.name(), error = %err, "Component shutdown failed");
            base.publish(&AppEvent::Component(ComponentEvent::Error {
                name: base.name().to_string(),
                error: err.to_string(),
                phase: ErrorPhase::Shutdown,
            }));
        }
        result
    }

    fn state(&self) -> LifecycleState {
        self.base().state()
    }
}

/// State shared by every component: name, lifecycle state, injected
/// dependencies and owned bus subscriptions.
pub struct ComponentBase {
    name: String,
    bus: EventBus,
    state: Arc<RwLock<LifecycleState>>,
    dependencies: RwLock<HashMap<String, Arc<dyn Component>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ComponentBase {
    /// Creates the base for a component named `name` on `bus`.
    pub fn new(name: impl Into<String>, bus: EventBus) -> Self {
        Self {
            name: name.into(),
            bus,
            state: Arc::new(RwLock::new(LifecycleState::Uncreated)),
            dependencies: RwLock::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: LifecycleState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Whether the component is `Ready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    /// The shared bus.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Injects (or replaces) a dependency under `name`.
    pub fn set_dependency(&self, name: impl Into<String>, instance: Arc<dyn Component>) {
        self.dependencies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), instance);
    }

    /// Soft lookup: the dependency downcast to `T`, if present.
    #[must_use]
    pub fn dependency<T: Component>(&self, name: &str) -> Option<Arc<T>> {
        let instance = self
            .dependencies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()?;
        instance.as_any_arc().downcast::<T>().ok()
    }

    /// Strict lookup for use in `on_init`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::MissingDependency`] when the dependency was not
    /// injected or is not a `T`.
    pub fn require<T: Component>(&self, name: &str) -> Result<Arc<T>, ComponentError> {
        self.dependency(name)
            .ok_or_else(|| ComponentError::MissingDependency {
                component: self.name.clone(),
                dependency: name.to_string(),
            })
    }

    /// Names of the injected dependencies.
    #[must_use]
    pub fn dependency_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .dependencies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Publishes on the shared bus.
    pub fn publish(&self, event: &AppEvent) -> bool {
        self.bus.publish(event)
    }

    /// Subscribes on the shared bus with this component as context.
    ///
    /// The subscription is dropped automatically on shutdown.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&AppEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let subscription = self.bus.subscribe(kind, Some(&self.name), callback);
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription.clone());
        subscription
    }

    fn unsubscribe_all(&self) {
        let subscriptions = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }

    /// Reports a failure that happened while serving.
    pub fn report_error(&self, phase: ErrorPhase, error: &dyn fmt::Display) {
        self.reporter().report(phase, error);
    }

    /// A detached handle for reporting failures from background tasks.
    #[must_use]
    pub fn reporter(&self) -> ErrorReporter {
        ErrorReporter {
            name: self.name.clone(),
            bus: self.bus.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl fmt::Debug for ComponentBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBase")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("dependencies", &self.dependency_names())
            .finish_non_exhaustive()
    }
}

/// Cloneable failure reporter bound to one component.
///
/// Reporting moves a `Ready` component to `Error` and publishes
/// `component:error`.
#[derive(Clone, Debug)]
pub struct ErrorReporter {
    name: String,
    bus: EventBus,
    state: Arc<RwLock<LifecycleState>>,
}

impl ErrorReporter {
    /// Records and publishes a failure.
    pub fn report(&self, phase: ErrorPhase, error: &dyn fmt::Display) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state == LifecycleState::Ready {
                *state = LifecycleState::Error;
            }
        }
        error!(component = %self.name, phase = %phase, error = %error, "Component error");
        self.bus
            .publish(&AppEvent::Component(ComponentEvent::Error {
                name: self.name.clone(),
                error: error.to_string(),
                phase,
            }));
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct StubComponent {
        base: ComponentBase,
        fail_init: AtomicBool,
        init_calls: AtomicUsize,
        shutdown_calls: AtomicUsize,
        fail_shutdown: bool,
    }

    impl StubComponent {
        fn new(name: &str, bus: &EventBus) -> Self {
            Self {
                base: ComponentBase::new(name, bus.clone()),
                fail_init: AtomicBool::new(false),
                init_calls: AtomicUsize::new(0),
                shutdown_calls: AtomicUsize::new(0),
                fail_shutdown: false,
            }
        }
    }

    #[async_trait]
    impl Component for StubComponent {
        fn base(&self) -> &ComponentBase {
            &self.base
        }

        async fn on_init(&self) -> Result<(), ComponentError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_init.load(Ordering::SeqCst) {
                return Err(ComponentError::other("component refused to start"));
            }
            self.base.subscribe(EventKind::AppShutdown, |_| Ok(()));
            Ok(())
        }

        async fn on_shutdown(&self) -> Result<(), ComponentError> {
            self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown {
                return Err(ComponentError::other("component stuck"));
            }
            Ok(())
        }
    }

    fn record(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<AppEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(kind, None, move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        seen
    }

    #[tokio::test]
    async fn init_moves_to_ready_and_announces() {
        let bus = EventBus::new();
        let announced = record(&bus, EventKind::ComponentInitialized);
        let component = StubComponent::new("component", &bus);

        assert_eq!(component.state(), LifecycleState::Uncreated);
        component.init().await.unwrap();
        assert_eq!(component.state(), LifecycleState::Ready);

        // Second init is a no-op.
        component.init().await.unwrap();
        assert_eq!(component.init_calls.load(Ordering::SeqCst), 1);

        let announced = announced.lock().unwrap();
        assert_eq!(
            *announced,
            vec![AppEvent::Component(ComponentEvent::Initialized {
                name: "component".into()
            })]
        );
    }

    #[tokio::test]
    async fn failed_init_moves_to_error_and_publishes() {
        let bus = EventBus::new();
        let errors = record(&bus, EventKind::ComponentError);
        let component = StubComponent::new("component", &bus);
        component.fail_init.store(true, Ordering::SeqCst);

        let err = component.init().await.unwrap_err();
        assert!(err.to_string().contains("refused"));
        assert_eq!(component.state(), LifecycleState::Error);

        let errors = errors.lock().unwrap();
        assert!(matches!(
            &errors[0],
            AppEvent::Component(ComponentEvent::Error { phase: ErrorPhase::Init, name, .. })
                if name == "component"
        ));

        // Error is absorbing for init.
        drop(errors);
        assert!(matches!(
            component.init().await,
            Err(ComponentError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_drops_subscriptions() {
        let bus = EventBus::new();
        let component = StubComponent::new("component", &bus);
        component.init().await.unwrap();
        assert_eq!(bus.subscriber_count(EventKind::AppShutdown), 1);

        component.shutdown().await.unwrap();
        component.shutdown().await.unwrap();

        assert_eq!(component.state(), LifecycleState::Stopped);
        assert_eq!(component.shutdown_calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(EventKind::AppShutdown), 0);
    }

    #[tokio::test]
    async fn failed_shutdown_still_stops() {
        let bus = EventBus::new();
        let mut component = StubComponent::new("component", &bus);
        component.fail_shutdown = true;
        component.init().await.unwrap();

        assert!(component.shutdown().await.is_err());
        assert_eq!(component.state(), LifecycleState::Stopped);
    }

    #[test]
    fn dependency_lookup_downcasts() {
        let bus = EventBus::new();
        let consumer = StubComponent::new("consumer", &bus);
        let provider: Arc<StubComponent> = Arc::new(StubComponent::new("provider", &bus));

        assert!(consumer.base.dependency::<StubComponent>("provider").is_none());
        let err = consumer.base.require::<StubComponent>("provider").unwrap_err();
        assert!(matches!(err, ComponentError::MissingDependency { .. }));

        consumer.base.set_dependency("provider", provider.clone());
        let found = consumer.base.require::<StubComponent>("provider").unwrap();
        assert!(Arc::ptr_eq(&found, &provider));
        assert_eq!(consumer.base.dependency_names(), vec!["provider".to_string()]);
    }

    #[tokio::test]
    async fn reporter_flags_ready_component() {
        let bus = EventBus::new();
        let errors = record(&bus, EventKind::ComponentError);
        let component = StubComponent::new("component", &bus);
        component.init().await.unwrap();

        component.base.reporter().report(ErrorPhase::Runtime, &"worker crashed");

        assert_eq!(component.state(), LifecycleState::Error);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }
}
