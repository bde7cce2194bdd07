//! Integration tests for the orchestrator lifecycle.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use tally_core::component::{Component, ComponentBase, ComponentError, ErrorPhase, Lifecycle, LifecycleState};
use tally_core::event::{AppEvent, AppLifecycleEvent, EventKind};
use tally_core::event_bus::EventBus;
use tally_runtime::{AppStatus, Orchestrator, OrchestratorError};
use tally_testing::EventRecorder;
use tally_testing::mocks::test_clock;

type CallLog = Arc<Mutex<Vec<String>>>;

struct StubComponent {
    base: ComponentBase,
    dependencies: Vec<String>,
    log: CallLog,
    fail_init: bool,
    fail_shutdown: bool,
}

impl StubComponent {
    fn new(name: &str, dependencies: &[&str], bus: &EventBus, log: &CallLog) -> Self {
        Self {
            base: ComponentBase::new(name, bus.clone()),
            dependencies: dependencies.iter().map(|d| (*d).to_string()).collect(),
            log: Arc::clone(log),
            fail_init: false,
            fail_shutdown: false,
        }
    }

    fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    fn failing_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }
}

#[async_trait]
impl Component for StubComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    async fn on_init(&self) -> Result<(), ComponentError> {
        for dependency in &self.dependencies {
            let dep = self.base.require::<StubComponent>(dependency)?;
            assert_eq!(dep.base().state(), LifecycleState::Ready);
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("init:{}", self.base.name()));
        if self.fail_init {
            return Err(ComponentError::other("init refused"));
        }
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), ComponentError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("shutdown:{}", self.base.name()));
        if self.fail_shutdown {
            return Err(ComponentError::other("shutdown stuck"));
        }
        Ok(())
    }
}

fn orchestrator(bus: &EventBus) -> Orchestrator {
    Orchestrator::new(bus.clone(), Arc::new(test_clock()))
}

fn calls(log: &CallLog, prefix: &str) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|entry| entry.strip_prefix(prefix).map(str::to_string))
        .collect()
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn initializes_in_dependency_order_and_announces_ready() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let recorder = EventRecorder::attach(&bus, &[EventKind::AppReady]);
    let mut orch = orchestrator(&bus);

    orch.register("goal", Arc::new(StubComponent::new("goal", &["database", "activity"], &bus, &log)), &["database", "activity"])
        .unwrap()
        .register("activity", Arc::new(StubComponent::new("activity", &["database"], &bus, &log)), &["database"])
        .unwrap()
        .register("database", Arc::new(StubComponent::new("database", &[], &bus, &log)), &[])
        .unwrap();

    orch.init().await.unwrap();

    assert_eq!(calls(&log, "init:"), vec!["database", "activity", "goal"]);
    assert_eq!(orch.health().status, AppStatus::Running);
    assert!(orch.is_initialized("goal"));

    let ready = recorder.of_kind(EventKind::AppReady);
    assert_eq!(ready.len(), 1);
    match &ready[0] {
        AppEvent::App(AppLifecycleEvent::Ready { components, .. }) => {
            assert_eq!(components, &vec!["database", "activity", "goal"]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let mut orch = orchestrator(&bus);

    orch.register("database", Arc::new(StubComponent::new("database", &[], &bus, &log)), &[])
        .unwrap();
    let err = orch
        .register("database", Arc::new(StubComponent::new("database", &[], &bus, &log)), &[])
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::DuplicateComponent(name) if name == "database"));
}

#[tokio::test]
async fn startup_stops_at_first_failure() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let recorder = EventRecorder::attach(&bus, &[EventKind::AppReady, EventKind::AppError]);
    let mut orch = orchestrator(&bus);

    orch.register("database", Arc::new(StubComponent::new("database", &[], &bus, &log)), &[])
        .unwrap()
        .register("activity", Arc::new(StubComponent::new("activity", &["database"], &bus, &log).failing_init()), &["database"])
        .unwrap()
        .register("goal", Arc::new(StubComponent::new("goal", &["activity"], &bus, &log)), &["activity"])
        .unwrap();

    let err = orch.init().await.unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::ComponentInitFailed { ref component, .. } if component == "activity"
    ));
    assert_eq!(calls(&log, "init:"), vec!["database", "activity"]);
    assert!(!orch.is_initialized("goal"));
    assert_eq!(recorder.count(EventKind::AppReady), 0);

    let health = orch.health();
    assert_eq!(health.status, AppStatus::Error);
    assert_eq!(health.components["activity"].error.as_deref(), Some("init refused"));

    // The failure is re-published application-wide.
    match &recorder.of_kind(EventKind::AppError)[..] {
        [AppEvent::App(AppLifecycleEvent::Error { component, phase, .. })] => {
            assert_eq!(component, "activity");
            assert_eq!(*phase, ErrorPhase::Init);
        }
        other => panic!("unexpected events {other:?}"),
    }

    // Cleanup only touches what started.
    orch.shutdown().await.unwrap();
    assert_eq!(calls(&log, "shutdown:"), vec!["database"]);
}

#[tokio::test]
async fn cycles_and_unknown_dependencies_fail_before_any_init() {
    let bus = EventBus::new();
    let log = CallLog::default();

    let mut cyclic = orchestrator(&bus);
    cyclic
        .register("a", Arc::new(StubComponent::new("a", &[], &bus, &log)), &["b"])
        .unwrap()
        .register("b", Arc::new(StubComponent::new("b", &[], &bus, &log)), &["a"])
        .unwrap();
    assert!(matches!(
        cyclic.init().await,
        Err(OrchestratorError::DependencyCycle { .. })
    ));

    let mut dangling = orchestrator(&bus);
    dangling
        .register("goal", Arc::new(StubComponent::new("goal", &[], &bus, &log)), &["database"])
        .unwrap();
    assert!(matches!(
        dangling.init().await,
        Err(OrchestratorError::MissingDependency { .. })
    ));

    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn explicit_order_is_used_as_is() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let mut orch = Orchestrator::with_init_order(
        bus.clone(),
        Arc::new(test_clock()),
        vec!["notification".into(), "database".into()],
    );

    orch.register("database", Arc::new(StubComponent::new("database", &[], &bus, &log)), &[])
        .unwrap()
        .register("notification", Arc::new(StubComponent::new("notification", &[], &bus, &log)), &[])
        .unwrap();

    orch.init().await.unwrap();
    assert_eq!(calls(&log, "init:"), vec!["notification", "database"]);
}

#[tokio::test]
async fn explicit_order_picks_up_unlisted_components() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let mut orch = Orchestrator::with_init_order(
        bus.clone(),
        Arc::new(test_clock()),
        vec!["database".into()],
    );

    orch.register("database", Arc::new(StubComponent::new("database", &[], &bus, &log)), &[])
        .unwrap()
        .register("activity", Arc::new(StubComponent::new("activity", &["database"], &bus, &log)), &["database"])
        .unwrap();

    assert_eq!(orch.init_order().unwrap(), vec!["database", "activity"]);
    orch.init().await.unwrap();

    assert!(orch.is_initialized("activity"));
    assert_eq!(orch.started_order(), ["database", "activity"]);
    assert_eq!(calls(&log, "init:"), vec!["database", "activity"]);
}

#[tokio::test]
async fn explicit_order_must_respect_dependencies() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let mut orch = Orchestrator::with_init_order(
        bus.clone(),
        Arc::new(test_clock()),
        vec!["goal".into(), "database".into()],
    );

    orch.register("database", Arc::new(StubComponent::new("database", &[], &bus, &log)), &[])
        .unwrap()
        .register("goal", Arc::new(StubComponent::new("goal", &["database"], &bus, &log)), &["database"])
        .unwrap();

    let err = orch.init().await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::DependencyNotInitialized { ref component, ref dependency }
            if component == "goal" && dependency == "database"
    ));

    let mut unknown = Orchestrator::with_init_order(
        bus.clone(),
        Arc::new(test_clock()),
        vec!["ghost".into()],
    );
    assert!(matches!(
        unknown.init().await,
        Err(OrchestratorError::ComponentNotRegistered(name)) if name == "ghost"
    ));
}

#[tokio::test]
async fn runtime_errors_are_recorded_but_keep_the_app_running() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let recorder = EventRecorder::attach(&bus, &[EventKind::AppError]);
    let mut orch = orchestrator(&bus);
    let goal = Arc::new(StubComponent::new("goal", &[], &bus, &log));

    orch.register("goal", goal.clone(), &[]).unwrap();
    orch.init().await.unwrap();

    goal.base().reporter().report(ErrorPhase::Runtime, &"recompute failed");

    let health = orch.health();
    assert_eq!(health.status, AppStatus::Running);
    assert_eq!(health.components["goal"].error.as_deref(), Some("recompute failed"));
    assert_eq!(recorder.count(EventKind::AppError), 1);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn shutdown_runs_in_reverse_and_collects_failures() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let recorder = EventRecorder::attach(&bus, &[EventKind::AppShutdown]);
    let mut orch = orchestrator(&bus);

    orch.register("database", Arc::new(StubComponent::new("database", &[], &bus, &log)), &[])
        .unwrap()
        .register("activity", Arc::new(StubComponent::new("activity", &["database"], &bus, &log).failing_shutdown()), &["database"])
        .unwrap()
        .register("goal", Arc::new(StubComponent::new("goal", &["activity"], &bus, &log)), &["activity"])
        .unwrap();

    orch.init().await.unwrap();
    let failures = orch.shutdown().await.unwrap_err();

    assert_eq!(calls(&log, "shutdown:"), vec!["goal", "activity", "database"]);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("activity:"));
    assert_eq!(recorder.count(EventKind::AppShutdown), 1);
    assert_eq!(orch.health().status, AppStatus::Stopped);

    let goal: Arc<StubComponent> = orch.component("goal").unwrap();
    assert_eq!(goal.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn typed_lookup_returns_registered_instance() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let mut orch = orchestrator(&bus);
    let database = Arc::new(StubComponent::new("database", &[], &bus, &log));

    orch.register("database", database.clone(), &[]).unwrap();

    let found: Arc<StubComponent> = orch.component("database").unwrap();
    assert!(Arc::ptr_eq(&found, &database));
    assert!(orch.component::<StubComponent>("missing").is_none());
}

// ============================================================================
// Ordering property
// ============================================================================

/// Random DAG: node `i` may depend only on nodes `< i`, then registration
/// order is shuffled.
fn dag() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (2usize..=10).prop_flat_map(|n| {
        let edges = proptest::collection::vec(proptest::bool::weighted(0.35), n * n);
        let registration = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        (Just(n), edges, registration).prop_map(|(n, edges, registration)| {
            let deps = (0..n)
                .map(|i| (0..i).filter(|&j| edges[i * n + j]).collect())
                .collect();
            (deps, registration)
        })
    })
}

proptest! {
    #[test]
    fn every_dependency_initializes_before_its_dependents((deps, registration) in dag()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let bus = EventBus::new();
            let log = CallLog::default();
            let mut orch = orchestrator(&bus);
            let names: Vec<String> = (0..deps.len()).map(|i| format!("c{i}")).collect();

            for &node in &registration {
                let dep_names: Vec<&str> = deps[node].iter().map(|&d| names[d].as_str()).collect();
                orch.register(
                    names[node].clone(),
                    Arc::new(StubComponent::new(&names[node], &dep_names, &bus, &log)),
                    &dep_names,
                )
                .unwrap();
            }

            orch.init().await.unwrap();

            let inits = calls(&log, "init:");
            prop_assert_eq!(inits.len(), names.len());
            let position = |name: &str| inits.iter().position(|n| n == name).unwrap();

            for (node, node_deps) in deps.iter().enumerate() {
                for &dep in node_deps {
                    prop_assert!(position(&names[dep]) < position(&names[node]));
                }
            }

            orch.shutdown().await.unwrap();
            let mut shutdowns = calls(&log, "shutdown:");
            shutdowns.reverse();
            prop_assert_eq!(shutdowns, inits);
            Ok(())
        })?;
    }
}
