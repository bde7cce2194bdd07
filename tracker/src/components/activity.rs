//! Activities and their log entries.

use super::{DatabaseComponent, Slot, names, optional, required};
use crate::error::DomainError;
use crate::model::{Activity, ActivityLog, ActivityUpdate, LogUpdate, NewActivity, NewLog};
use crate::store::TrackerStore;
use async_trait::async_trait;
use std::sync::Arc;
use tally_core::component::{Component, ComponentBase, ComponentError};
use tally_core::environment::Clock;
use tally_core::event::{ActivityEvent, AppEvent, LogEvent};
use tally_core::event_bus::EventBus;
use tally_core::types::{ActivityId, LogId, UserId};
use tracing::debug;

const NOT_OWNED_ACTIVITY: &str = "Activity does not belong to user";
const NOT_OWNED_LOG: &str = "Log does not belong to user";

/// Activity definitions and logging.
///
/// Every operation is scoped to an acting user. Touching another user's
/// activity or log fails with [`DomainError::NotOwned`].
pub struct ActivityComponent {
    base: ComponentBase,
    clock: Arc<dyn Clock>,
    store: Slot<dyn TrackerStore>,
}

impl ActivityComponent {
    /// Creates the component. Depends on [`names::DATABASE`].
    pub fn new(bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            base: ComponentBase::new(names::ACTIVITY, bus),
            clock,
            store: Slot::new(names::ACTIVITY),
        }
    }

    /// Defines a new activity for `user`.
    ///
    /// # Errors
    ///
    /// [`DomainError::Validation`] for a blank name or unit.
    pub async fn create_activity(
        &self,
        user: UserId,
        input: NewActivity,
    ) -> Result<Activity, DomainError> {
        let store = self.store.get()?;
        let now = self.clock.now();
        let activity = Activity {
            id: ActivityId::new(),
            owner_id: user,
            name: required("name", &input.name)?,
            unit: required("unit", &input.unit)?,
            description: optional(input.description.as_deref()),
            created_at: now,
            updated_at: now,
        };
        store.insert_activity(&activity).await?;

        self.base.publish(&AppEvent::Activity(ActivityEvent::Created {
            user_id: user,
            activity_id: activity.id,
            name: activity.name.clone(),
            unit: activity.unit.clone(),
            timestamp: now,
        }));
        Ok(activity)
    }

    /// Loads one of `user`'s activities.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] or [`DomainError::NotOwned`].
    pub async fn get_activity(&self, user: UserId, id: ActivityId) -> Result<Activity, DomainError> {
        let activity = self
            .store
            .get()?
            .get_activity(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Activity", id))?;
        if activity.owner_id != user {
            return Err(DomainError::NotOwned(NOT_OWNED_ACTIVITY.into()));
        }
        Ok(activity)
    }

    /// `user`'s activities, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list_activities(&self, user: UserId) -> Result<Vec<Activity>, DomainError> {
        Ok(self.store.get()?.list_activities(user).await?)
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`], [`DomainError::NotOwned`] or
    /// [`DomainError::Validation`].
    pub async fn update_activity(
        &self,
        user: UserId,
        id: ActivityId,
        update: ActivityUpdate,
    ) -> Result<Activity, DomainError> {
        let store = self.store.get()?;
        let mut activity = self.get_activity(user, id).await?;

        if let Some(name) = update.name.as_deref() {
            activity.name = required("name", name)?;
        }
        if let Some(unit) = update.unit.as_deref() {
            activity.unit = required("unit", unit)?;
        }
        if let Some(description) = update.description.as_deref() {
            activity.description = optional(Some(description));
        }
        activity.updated_at = self.clock.now();
        store.update_activity(&activity).await?;

        self.base.publish(&AppEvent::Activity(ActivityEvent::Updated {
            user_id: user,
            activity_id: id,
            timestamp: activity.updated_at,
        }));
        Ok(activity)
    }

    /// Deletes an activity with its logs and goals.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] or [`DomainError::NotOwned`].
    pub async fn delete_activity(&self, user: UserId, id: ActivityId) -> Result<(), DomainError> {
        let store = self.store.get()?;
        self.get_activity(user, id).await?;
        if !store.delete_activity(id).await? {
            return Err(DomainError::not_found("Activity", id));
        }
        self.base.publish(&AppEvent::Activity(ActivityEvent::Deleted {
            user_id: user,
            activity_id: id,
            timestamp: self.clock.now(),
        }));
        Ok(())
    }

    /// Records a count against one of `user`'s activities and publishes
    /// `log:created`.
    ///
    /// # Errors
    ///
    /// [`DomainError::Validation`] unless the count is positive and finite;
    /// [`DomainError::NotFound`] or [`DomainError::NotOwned`] for the activity.
    pub async fn log_activity(
        &self,
        user: UserId,
        activity_id: ActivityId,
        input: NewLog,
    ) -> Result<ActivityLog, DomainError> {
        let store = self.store.get()?;
        validate_count(input.count)?;
        self.get_activity(user, activity_id).await?;

        let now = self.clock.now();
        let log = ActivityLog {
            id: LogId::new(),
            owner_id: user,
            activity_id,
            count: input.count,
            logged_at: input.logged_at.unwrap_or(now),
            notes: optional(input.notes.as_deref()),
            created_at: now,
        };
        store.insert_log(&log).await?;
        debug!(log_id = %log.id, activity_id = %activity_id, count = log.count, "Activity logged");

        self.base.publish(&AppEvent::Log(LogEvent::Created {
            user_id: user,
            activity_id,
            log_id: log.id,
            count: log.count,
            logged_at: log.logged_at,
            timestamp: now,
        }));
        Ok(log)
    }

    /// Log entries for one of `user`'s activities, most recent first.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] or [`DomainError::NotOwned`] for the activity.
    pub async fn list_logs(
        &self,
        user: UserId,
        activity_id: ActivityId,
    ) -> Result<Vec<ActivityLog>, DomainError> {
        let store = self.store.get()?;
        self.get_activity(user, activity_id).await?;
        Ok(store.list_logs(user, activity_id).await?)
    }

    /// Loads one of `user`'s log entries.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] or [`DomainError::NotOwned`].
    pub async fn get_log(&self, user: UserId, id: LogId) -> Result<ActivityLog, DomainError> {
        let log = self
            .store
            .get()?
            .get_log(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Log", id))?;
        if log.owner_id != user {
            return Err(DomainError::NotOwned(NOT_OWNED_LOG.into()));
        }
        Ok(log)
    }

    /// Applies a partial update and publishes `log:updated`.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`], [`DomainError::NotOwned`] or
    /// [`DomainError::Validation`].
    pub async fn update_log(
        &self,
        user: UserId,
        id: LogId,
        update: LogUpdate,
    ) -> Result<ActivityLog, DomainError> {
        let store = self.store.get()?;
        let mut log = self.get_log(user, id).await?;

        if let Some(count) = update.count {
            validate_count(count)?;
            log.count = count;
        }
        if let Some(logged_at) = update.logged_at {
            log.logged_at = logged_at;
        }
        if let Some(notes) = update.notes.as_deref() {
            log.notes = optional(Some(notes));
        }
        store.update_log(&log).await?;

        self.base.publish(&AppEvent::Log(LogEvent::Updated {
            user_id: user,
            activity_id: log.activity_id,
            log_id: id,
            count: log.count,
            logged_at: log.logged_at,
            timestamp: self.clock.now(),
        }));
        Ok(log)
    }

    /// Deletes a log entry and publishes `log:deleted`.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] or [`DomainError::NotOwned`].
    pub async fn delete_log(&self, user: UserId, id: LogId) -> Result<(), DomainError> {
        let store = self.store.get()?;
        let log = self.get_log(user, id).await?;
        if !store.delete_log(id).await? {
            return Err(DomainError::not_found("Log", id));
        }
        self.base.publish(&AppEvent::Log(LogEvent::Deleted {
            user_id: user,
            activity_id: log.activity_id,
            log_id: id,
            timestamp: self.clock.now(),
        }));
        Ok(())
    }
}

fn validate_count(count: f64) -> Result<(), DomainError> {
    if count.is_finite() && count > 0.0 {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "count must be a positive number, got {count}"
        )))
    }
}

#[async_trait]
impl Component for ActivityComponent {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    async fn on_init(&self) -> Result<(), ComponentError> {
        let database = self.base.require::<DatabaseComponent>(names::DATABASE)?;
        self.store.set(database.store());
        Ok(())
    }

    async fn on_shutdown(&self) -> Result<(), ComponentError> {
        self.store.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tally_core::component::Lifecycle;
    use tally_core::event::EventKind;
    use tally_testing::EventRecorder;
    use tally_testing::mocks::test_clock;

    async fn started(bus: &EventBus) -> ActivityComponent {
        let database = Arc::new(DatabaseComponent::in_memory(bus.clone()));
        database.init().await.unwrap();
        let activity = ActivityComponent::new(bus.clone(), Arc::new(test_clock()));
        activity.base().set_dependency(names::DATABASE, database);
        activity.init().await.unwrap();
        activity
    }

    fn pushups() -> NewActivity {
        NewActivity {
            name: "Push-ups".into(),
            unit: "reps".into(),
            description: None,
        }
    }

    fn count(n: f64) -> NewLog {
        NewLog {
            count: n,
            logged_at: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn foreign_activity_is_not_owned() {
        let bus = EventBus::new();
        let component = started(&bus).await;
        let owner = UserId::new();
        let activity = component.create_activity(owner, pushups()).await.unwrap();

        let err = component
            .get_activity(UserId::new(), activity.id)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Activity does not belong to user");
    }

    #[tokio::test]
    async fn logging_publishes_log_created_with_clock_time() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus, &[EventKind::LogCreated]);
        let component = started(&bus).await;
        let user = UserId::new();
        let activity = component.create_activity(user, pushups()).await.unwrap();

        let log = component
            .log_activity(user, activity.id, count(20.0))
            .await
            .unwrap();

        assert_eq!(log.logged_at, test_clock().now());
        let events = recorder.of_kind(EventKind::LogCreated);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            AppEvent::Log(LogEvent::Created { log_id, .. }) if *log_id == log.id
        ));
    }

    #[tokio::test]
    async fn counts_must_be_positive() {
        let bus = EventBus::new();
        let component = started(&bus).await;
        let user = UserId::new();
        let activity = component.create_activity(user, pushups()).await.unwrap();

        for bad in [0.0, -1.0, f64::INFINITY] {
            let err = component
                .log_activity(user, activity.id, count(bad))
                .await
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn logs_list_newest_first_and_update_publishes() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus, &[EventKind::LogUpdated, EventKind::LogDeleted]);
        let component = started(&bus).await;
        let user = UserId::new();
        let activity = component.create_activity(user, pushups()).await.unwrap();
        let early = test_clock().now() - chrono::Duration::hours(2);

        let first = component
            .log_activity(
                user,
                activity.id,
                NewLog {
                    count: 5.0,
                    logged_at: Some(early),
                    notes: None,
                },
            )
            .await
            .unwrap();
        let second = component
            .log_activity(user, activity.id, count(7.0))
            .await
            .unwrap();

        let logs = component.list_logs(user, activity.id).await.unwrap();
        assert_eq!(logs.iter().map(|l| l.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let updated = component
            .update_log(
                user,
                first.id,
                LogUpdate {
                    count: Some(6.0),
                    ..LogUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!((updated.count - 6.0).abs() < f64::EPSILON);

        component.delete_log(user, second.id).await.unwrap();
        assert_eq!(recorder.names(), vec!["log:updated", "log:deleted"]);
    }

    #[tokio::test]
    async fn foreign_log_cannot_be_changed() {
        let bus = EventBus::new();
        let component = started(&bus).await;
        let user = UserId::new();
        let activity = component.create_activity(user, pushups()).await.unwrap();
        let log = component
            .log_activity(user, activity.id, count(1.0))
            .await
            .unwrap();

        let err = component.delete_log(UserId::new(), log.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotOwned(_)));
    }
}
