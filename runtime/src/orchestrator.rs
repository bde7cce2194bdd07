//! Component registry and lifecycle driver.
//!
//! The [`Orchestrator`] owns every registered component, resolves a safe
//! initialization order from the declared dependencies, injects dependency
//! references, and drives `init` / `shutdown`.
//!
//! # Ordering
//!
//! Without an explicit order, components initialize in depth-first
//! post-order over the dependency graph: every dependency before its
//! dependents, registration order as the tiebreak. Shutdown walks the order
//! that was actually used, in reverse.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut orchestrator = Orchestrator::new(bus, clock);
//! orchestrator
//!     .register("database", database, &[])?
//!     .register("activity", activity, &["database"])?
//!     .register("goal", goal, &["database", "activity"])?;
//!
//! orchestrator.init().await?;
//! // ... serve ...
//! orchestrator.shutdown().await.ok();
//! ```

use crate::health::{AppStatus, HealthMonitor, HealthSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tally_core::component::{Component, ComponentError, Lifecycle};
use tally_core::environment::Clock;
use tally_core::event::{AppEvent, AppLifecycleEvent, ComponentEvent, EventKind};
use tally_core::event_bus::{EventBus, Subscription};
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors raised while registering or starting components.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A component with this name is already registered.
    #[error("Component '{0}' is already registered")]
    DuplicateComponent(String),

    /// The explicit init order names a component that was never registered.
    #[error("Component '{0}' is not registered")]
    ComponentNotRegistered(String),

    /// A component depends on a name that was never registered.
    #[error("Component '{component}' depends on unregistered component '{dependency}'")]
    MissingDependency {
        /// The dependent component.
        component: String,
        /// The missing dependency.
        dependency: String,
    },

    /// A dependency had not been initialized when its dependent was reached.
    #[error("Component '{component}' requires '{dependency}' to be initialized first")]
    DependencyNotInitialized {
        /// The dependent component.
        component: String,
        /// The dependency that is not ready.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    DependencyCycle {
        /// The components forming the cycle, first name repeated at the end.
        cycle: Vec<String>,
    },

    /// A component's `init` failed.
    #[error("Component '{component}' failed to initialize: {source}")]
    ComponentInitFailed {
        /// The failing component.
        component: String,
        /// The underlying error.
        #[source]
        source: ComponentError,
    },
}

/// One registered component.
struct Registration {
    name: String,
    instance: Arc<dyn Component>,
    dependencies: Vec<String>,
    initialized: bool,
}

/// Registers components and drives their lifecycle.
pub struct Orchestrator {
    bus: EventBus,
    clock: Arc<dyn Clock>,
    registry: Vec<Registration>,
    index: HashMap<String, usize>,
    explicit_order: Vec<String>,
    started_order: Vec<String>,
    health: HealthMonitor,
    error_subscription: Subscription,
}

impl Orchestrator {
    /// Creates an orchestrator that resolves init order from dependencies.
    #[must_use]
    pub fn new(bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self::with_init_order(bus, clock, Vec::new())
    }

    /// Creates an orchestrator with an explicit init order.
    ///
    /// A non-empty `order` is used as-is, with components registered later
    /// appended in registration order. An empty one means "resolve from
    /// dependencies".
    #[must_use]
    pub fn with_init_order(bus: EventBus, clock: Arc<dyn Clock>, order: Vec<String>) -> Self {
        let health = HealthMonitor::new(Arc::clone(&clock));
        let error_subscription = Self::watch_component_errors(&bus, &health);

        Self {
            bus,
            clock,
            registry: Vec::new(),
            index: HashMap::new(),
            explicit_order: order,
            started_order: Vec::new(),
            health,
            error_subscription,
        }
    }

    /// Mirrors `component:error` into health and re-publishes it as `app:error`.
    fn watch_component_errors(bus: &EventBus, health: &HealthMonitor) -> Subscription {
        let health = health.clone();
        let weak_bus = bus.downgrade();
        bus.subscribe(EventKind::ComponentError, Some("orchestrator"), move |event| {
            if let AppEvent::Component(ComponentEvent::Error { name, error, phase }) = event {
                health.record_error(name, error);
                if let Some(bus) = weak_bus.upgrade() {
                    bus.publish(&AppEvent::App(AppLifecycleEvent::Error {
                        component: name.clone(),
                        error: error.clone(),
                        phase: *phase,
                    }));
                }
            }
            Ok(())
        })
    }

    /// Registers `instance` under `name` with its dependency names.
    ///
    /// Duplicate dependency names are collapsed, keeping first occurrence.
    /// With an explicit init order, `name` is appended to it if missing.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::DuplicateComponent`] when `name` is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        instance: Arc<dyn Component>,
        dependencies: &[&str],
    ) -> Result<&mut Self, OrchestratorError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(OrchestratorError::DuplicateComponent(name));
        }

        let mut deps: Vec<String> = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            if !deps.iter().any(|existing| existing == dependency) {
                deps.push((*dependency).to_string());
            }
        }

        if !self.explicit_order.is_empty() && !self.explicit_order.contains(&name) {
            self.explicit_order.push(name.clone());
        }
        self.health.track(&name);
        self.index.insert(name.clone(), self.registry.len());
        self.registry.push(Registration {
            name,
            instance,
            dependencies: deps,
            initialized: false,
        });
        Ok(self)
    }

    /// Initializes every component in dependency order.
    ///
    /// Stops at the first failure; components already started stay
    /// initialized and are torn down by [`Orchestrator::shutdown`].
    ///
    /// # Errors
    ///
    /// Ordering errors ([`OrchestratorError::DependencyCycle`],
    /// [`OrchestratorError::MissingDependency`],
    /// [`OrchestratorError::ComponentNotRegistered`]), a dependency that is
    /// not initialized when its dependent is reached, or the first component
    /// failure.
    pub async fn init(&mut self) -> Result<(), OrchestratorError> {
        self.health.set_status(AppStatus::Starting);
        info!(components = self.registry.len(), "Starting components");

        let result = self.init_in_order().await;
        match &result {
            Ok(()) => {
                self.health.set_status(AppStatus::Running);
                info!(order = ?self.started_order, "All components initialized");
                self.bus.publish(&AppEvent::App(AppLifecycleEvent::Ready {
                    timestamp: self.clock.now(),
                    components: self.started_order.clone(),
                }));
            }
            Err(err) => {
                self.health.set_status(AppStatus::Error);
                error!(error = %err, "Startup aborted");
            }
        }
        result
    }

    async fn init_in_order(&mut self) -> Result<(), OrchestratorError> {
        let order = self.init_order()?;

        for name in order {
            let position = self.position(&name)?;
            if self.registry[position].initialized {
                continue;
            }

            // Every dependency must exist and already be initialized.
            let mut resolved = Vec::with_capacity(self.registry[position].dependencies.len());
            for dependency in &self.registry[position].dependencies {
                let Some(&dep_position) = self.index.get(dependency) else {
                    return Err(OrchestratorError::MissingDependency {
                        component: name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                let dep = &self.registry[dep_position];
                if !dep.initialized {
                    return Err(OrchestratorError::DependencyNotInitialized {
                        component: name.clone(),
                        dependency: dependency.clone(),
                    });
                }
                resolved.push((dependency.clone(), Arc::clone(&dep.instance)));
            }

            let instance = Arc::clone(&self.registry[position].instance);
            for (dependency, dep_instance) in resolved {
                instance.base().set_dependency(dependency, dep_instance);
            }

            let started = Instant::now();
            if let Err(source) = instance.init().await {
                return Err(OrchestratorError::ComponentInitFailed {
                    component: name,
                    source,
                });
            }
            let elapsed = started.elapsed();

            metrics::histogram!(
                "orchestrator_component_init_duration_seconds",
                "component" => name.clone()
            )
            .record(elapsed.as_secs_f64());
            self.health.record_init(&name, elapsed);
            self.registry[position].initialized = true;
            self.started_order.push(name);
        }

        Ok(())
    }

    /// The order `init` will use.
    ///
    /// # Errors
    ///
    /// Same ordering errors as [`resolve_init_order`], or
    /// [`OrchestratorError::ComponentNotRegistered`] for an explicit order
    /// naming an unknown component.
    pub fn init_order(&self) -> Result<Vec<String>, OrchestratorError> {
        if self.explicit_order.is_empty() {
            let graph: Vec<(String, Vec<String>)> = self
                .registry
                .iter()
                .map(|reg| (reg.name.clone(), reg.dependencies.clone()))
                .collect();
            return resolve_init_order(&graph);
        }

        for name in &self.explicit_order {
            self.position(name)?;
        }
        Ok(self.explicit_order.clone())
    }

    fn position(&self, name: &str) -> Result<usize, OrchestratorError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| OrchestratorError::ComponentNotRegistered(name.to_string()))
    }

    /// Shuts down started components in reverse start order.
    ///
    /// Publishes `app:shutdown` first. Every component is attempted even if
    /// an earlier one fails.
    ///
    /// # Errors
    ///
    /// The collected `"name: error"` messages of components whose shutdown
    /// failed.
    pub async fn shutdown(&mut self) -> Result<(), Vec<String>> {
        self.health.set_status(AppStatus::ShuttingDown);
        info!(components = self.started_order.len(), "Shutting down components");

        self.bus.publish(&AppEvent::App(AppLifecycleEvent::Shutdown {
            timestamp: self.clock.now(),
        }));

        let mut failures = Vec::new();
        let order = std::mem::take(&mut self.started_order);
        for name in order.iter().rev() {
            let Some(&position) = self.index.get(name) else {
                continue;
            };
            if !self.registry[position].initialized {
                continue;
            }

            let instance = Arc::clone(&self.registry[position].instance);
            if let Err(err) = instance.shutdown().await {
                warn!(component = %name, error = %err, "Component shutdown failed");
                failures.push(format!("{name}: {err}"));
            }
            self.registry[position].initialized = false;
            self.health.record_stopped(name);
        }

        self.health.set_status(AppStatus::Stopped);
        if failures.is_empty() {
            info!("Shutdown complete");
            Ok(())
        } else {
            Err(failures)
        }
    }

    /// Health snapshot; refreshes `last_checked`.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    /// A cloneable handle to the health record.
    #[must_use]
    pub fn health_monitor(&self) -> HealthMonitor {
        self.health.clone()
    }

    /// The shared bus.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The registered component `name` as its concrete type.
    #[must_use]
    pub fn component<T: Component>(&self, name: &str) -> Option<Arc<T>> {
        let position = *self.index.get(name)?;
        Arc::clone(&self.registry[position].instance)
            .as_any_arc()
            .downcast::<T>()
            .ok()
    }

    /// Registered names, in registration order.
    #[must_use]
    pub fn component_names(&self) -> Vec<String> {
        self.registry.iter().map(|reg| reg.name.clone()).collect()
    }

    /// Whether `name` is registered and initialized.
    #[must_use]
    pub fn is_initialized(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|&position| self.registry[position].initialized)
    }

    /// Names in the order they were started by the last `init`.
    #[must_use]
    pub fn started_order(&self) -> &[String] {
        &self.started_order
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.error_subscription.unsubscribe();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("components", &self.component_names())
            .field("started", &self.started_order)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Depth-first post-order over `graph` (`(name, dependencies)` pairs).
///
/// Dependencies come before dependents; ties follow the order of `graph`
/// and of each dependency list.
///
/// # Errors
///
/// [`OrchestratorError::MissingDependency`] when a dependency is not a node,
/// [`OrchestratorError::DependencyCycle`] when the graph is cyclic.
pub fn resolve_init_order(
    graph: &[(String, Vec<String>)],
) -> Result<Vec<String>, OrchestratorError> {
    let index: HashMap<&str, usize> = graph
        .iter()
        .enumerate()
        .map(|(position, (name, _))| (name.as_str(), position))
        .collect();

    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut order = Vec::with_capacity(graph.len());
    let mut path = Vec::new();

    for position in 0..graph.len() {
        visit(position, graph, &index, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit(
    position: usize,
    graph: &[(String, Vec<String>)],
    index: &HashMap<&str, usize>,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<String>,
) -> Result<(), OrchestratorError> {
    match marks[position] {
        Mark::Done => return Ok(()),
        Mark::Visiting => {
            let start = path.iter().position(|&p| p == position).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..]
                .iter()
                .map(|&p| graph[p].0.clone())
                .collect();
            cycle.push(graph[position].0.clone());
            return Err(OrchestratorError::DependencyCycle { cycle });
        }
        Mark::Unvisited => {}
    }

    marks[position] = Mark::Visiting;
    path.push(position);

    let (name, dependencies) = &graph[position];
    for dependency in dependencies {
        let Some(&dep_position) = index.get(dependency.as_str()) else {
            return Err(OrchestratorError::MissingDependency {
                component: name.clone(),
                dependency: dependency.clone(),
            });
        };
        visit(dep_position, graph, index, marks, path, order)?;
    }

    path.pop();
    marks[position] = Mark::Done;
    order.push(name.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn graph(nodes: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        nodes
            .iter()
            .map(|(name, deps)| {
                (
                    (*name).to_string(),
                    deps.iter().map(|d| (*d).to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn leaves_come_first_with_registration_tiebreak() {
        let order = resolve_init_order(&graph(&[
            ("goal", &["database", "activity"]),
            ("activity", &["database"]),
            ("database", &[]),
            ("notification", &[]),
        ]))
        .unwrap();

        assert_eq!(order, vec!["database", "activity", "goal", "notification"]);
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let err = resolve_init_order(&graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]))
            .unwrap_err();

        match err {
            OrchestratorError::DependencyCycle { cycle } => {
                assert_eq!(cycle, vec!["a", "b", "c", "a"]);
            }
            other => unreachable!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_dependency_is_reported() {
        let err = resolve_init_order(&graph(&[("goal", &["ghost"])])).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::MissingDependency { ref component, ref dependency }
                if component == "goal" && dependency == "ghost"
        ));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = resolve_init_order(&graph(&[("a", &["a"])])).unwrap_err();
        assert!(matches!(err, OrchestratorError::DependencyCycle { .. }));
    }
}
