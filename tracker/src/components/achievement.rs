//! Achievements earned by completing goals.

use super::worker::JobQueue;
use super::{DatabaseComponent, Slot, names};
use crate::error::DomainError;
use crate::model::Achievement;
use crate::store::TrackerStore;
use async_trait::async_trait;
use std::sync::Arc;
use tally_core::component::{Component, ComponentBase, ComponentError};
use tally_core::environment::Clock;
use tally_core::event::{AchievementEvent, AppEvent, EventKind, GoalAchieved, GoalEvent};
use tally_core::event_bus::EventBus;
use tally_core::types::{AchievementId, UserId};
use tracing::info;

/// Records an [`Achievement`] for every `goal:achieved` and announces it with
/// `achievement:earned`.
///
/// Depends on [`names::DATABASE`].
pub struct AchievementComponent {
    base: ComponentBase,
    clock: Arc<dyn Clock>,
    store: Slot<dyn TrackerStore>,
    queue: JobQueue<GoalAchieved>,
}

impl AchievementComponent {
    /// Creates the component.
    pub fn new(bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            base: ComponentBase::new(names::ACHIEVEMENT, bus),
            clock,
            store: Slot::new(names::ACHIEVEMENT),
            queue: JobQueue::new(names::ACHIEVEMENT),
        }
    }

    /// `user`'s achievements, most recent first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list_achievements(&self, user: UserId) -> Result<Vec<Achievement>, DomainError> {
        Ok(self.store.get()?.list_achievements(user).await?)
    }

    /// Waits until every achievement queued so far is recorded.
    pub async fn settle(&self) {
        self.queue.settle().await;
    }
}

async fn record(
    store: &dyn TrackerStore,
    bus: &EventBus,
    clock: &dyn Clock,
    achieved: GoalAchieved,
) -> Result<(), DomainError> {
    let achievement = Achievement {
        id: AchievementId::new(),
        owner_id: achieved.user_id,
        goal_id: achieved.goal_id,
        title: format!("{} goal achieved", achieved.goal_name),
        description: format!(
            "Reached {} {} ({})",
            achieved.goal_target, achieved.goal_unit, achieved.goal_period
        ),
        earned_at: clock.now(),
    };
    store.insert_achievement(&achievement).await?;
    info!(achievement_id = %achievement.id, goal_id = %achievement.goal_id, "Achievement earned");

    bus.publish(&AppEvent::Achievement(AchievementEvent::Earned {
        user_id: achievement.owner_id,
        achievement_id: achievement.id,
        goal_id: achievement.goal_id,
        title: achievement.title,
        timestamp: achievement.earned_at,
    }));
    Ok(())
}

#[async_trait]
impl Component for AchievementComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    async fn on_init(&self) -> Result<(), ComponentError> {
        let database = self.base.require::<DatabaseComponent>(names::DATABASE)?;
        let store = database.store();
        let bus = self.base.bus().clone();
        let clock = Arc::clone(&self.clock);

        let jobs = {
            let store = Arc::clone(&store);
            self.queue.start(self.base.reporter(), move |achieved| {
                let store = Arc::clone(&store);
                let bus = bus.clone();
                let clock = Arc::clone(&clock);
                async move { record(store.as_ref(), &bus, clock.as_ref(), achieved).await }
            })
        };
        self.base.subscribe(EventKind::GoalAchieved, move |event| match event {
            AppEvent::Goal(GoalEvent::Achieved(achieved)) => jobs.send(achieved.clone()),
            _ => Ok(()),
        });

        self.store.set(store);
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), ComponentError> {
        self.queue.stop().await;
        self.store.clear();
        Ok(())
    }
}
