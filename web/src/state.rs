//! Application state for Axum handlers.

use std::sync::Arc;
use tally_core::component::{ComponentBase, ComponentError};
use tally_runtime::HealthMonitor;
use tally_tracker::components::names;
use tally_tracker::{
    AchievementComponent, ActivityComponent, AuthComponent, GoalComponent, NotificationComponent,
};

/// Handles to the domain components, shared by every handler.
///
/// Handlers call components directly. Health is read through a
/// [`HealthMonitor`] clone, never through the orchestrator.
#[derive(Clone)]
pub struct AppState {
    /// User registry.
    pub auth: Arc<AuthComponent>,
    /// Activities and their logs.
    pub activities: Arc<ActivityComponent>,
    /// Goals and progress.
    pub goals: Arc<GoalComponent>,
    /// Earned achievements.
    pub achievements: Arc<AchievementComponent>,
    /// User notifications.
    pub notifications: Arc<NotificationComponent>,
    /// Application health.
    pub health: HealthMonitor,
}

impl AppState {
    /// Builds the state from a component's injected dependencies.
    ///
    /// # Errors
    ///
    /// [`ComponentError::MissingDependency`] when any domain component was
    /// not injected into `base`.
    pub fn from_dependencies(
        base: &ComponentBase,
        health: HealthMonitor,
    ) -> Result<Self, ComponentError> {
        Ok(Self {
            auth: base.require(names::AUTH)?,
            activities: base.require(names::ACTIVITY)?,
            goals: base.require(names::GOAL)?,
            achievements: base.require(names::ACHIEVEMENT)?,
            notifications: base.require(names::NOTIFICATION)?,
            health,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::event_bus::EventBus;
    use tally_testing::mocks::test_clock;

    #[test]
    fn missing_dependencies_are_reported() {
        let base = ComponentBase::new("http", EventBus::new());
        let health = HealthMonitor::new(Arc::new(test_clock()));

        let err = AppState::from_dependencies(&base, health).err();

        assert!(matches!(
            err,
            Some(ComponentError::MissingDependency { dependency, .. }) if dependency == names::AUTH
        ));
    }
}
