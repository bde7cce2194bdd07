//! Persistence for tracker entities.
//!
//! [`TrackerStore`] is the seam between domain components and storage. Two
//! implementations ship:
//!
//! - [`sql::SqlTrackerStore`]: Postgres SQL over any [`QueryExecutor`](tally_core::query::QueryExecutor)
//! - [`memory::InMemoryTrackerStore`]: in-process maps for tests and local runs
//!
//! Stores do not check ownership; components do. Deleting a user or activity
//! removes everything that references it.

pub mod memory;
pub mod sql;

use crate::error::StoreError;
use crate::model::{Achievement, Activity, ActivityLog, Goal, Notification, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_core::types::{ActivityId, GoalId, LogId, NotificationId, UserId};

pub use memory::InMemoryTrackerStore;
pub use sql::SqlTrackerStore;

/// Storage operations used by the tracker components.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Verifies the backing storage is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    // ----- users -----

    /// Inserts a user. Username and email are unique.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    /// Loads a user.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    /// All users, oldest first.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Replaces the mutable fields of a user.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
    /// Deletes a user and everything it owns. Returns whether it existed.
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;

    // ----- activities -----

    /// Inserts an activity.
    async fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError>;
    /// Loads an activity.
    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StoreError>;
    /// A user's activities, oldest first.
    async fn list_activities(&self, owner: UserId) -> Result<Vec<Activity>, StoreError>;
    /// Replaces the mutable fields of an activity.
    async fn update_activity(&self, activity: &Activity) -> Result<(), StoreError>;
    /// Deletes an activity with its logs and goals. Returns whether it existed.
    async fn delete_activity(&self, id: ActivityId) -> Result<bool, StoreError>;

    // ----- logs -----

    /// Inserts a log entry.
    async fn insert_log(&self, log: &ActivityLog) -> Result<(), StoreError>;
    /// Loads a log entry.
    async fn get_log(&self, id: LogId) -> Result<Option<ActivityLog>, StoreError>;
    /// Entries for one activity, most recent `logged_at` first.
    async fn list_logs(
        &self,
        owner: UserId,
        activity: ActivityId,
    ) -> Result<Vec<ActivityLog>, StoreError>;
    /// Entries with `start <= logged_at <= end`, oldest first.
    async fn logs_between(
        &self,
        owner: UserId,
        activity: ActivityId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityLog>, StoreError>;
    /// Replaces count, time and notes of a log entry.
    async fn update_log(&self, log: &ActivityLog) -> Result<(), StoreError>;
    /// Deletes a log entry. Returns whether it existed.
    async fn delete_log(&self, id: LogId) -> Result<bool, StoreError>;

    // ----- goals -----

    /// Inserts a goal.
    async fn insert_goal(&self, goal: &Goal) -> Result<(), StoreError>;
    /// Loads a goal.
    async fn get_goal(&self, id: GoalId) -> Result<Option<Goal>, StoreError>;
    /// A user's goals, oldest first, optionally only active ones.
    async fn list_goals(&self, owner: UserId, active_only: bool) -> Result<Vec<Goal>, StoreError>;
    /// Active goals tracking `activity`.
    async fn active_goals_for_activity(
        &self,
        owner: UserId,
        activity: ActivityId,
    ) -> Result<Vec<Goal>, StoreError>;
    /// Replaces target, period, dates and `is_active`. Never touches
    /// completion state.
    async fn update_goal(&self, goal: &Goal) -> Result<(), StoreError>;
    /// Deletes a goal. Returns whether it existed.
    async fn delete_goal(&self, id: GoalId) -> Result<bool, StoreError>;
    /// Sets `is_completed = true, completed_at = at` if the goal is not yet
    /// completed.
    ///
    /// Returns `true` only for the call that performed the transition.
    async fn mark_goal_completed(&self, id: GoalId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    // ----- achievements -----

    /// Inserts an achievement.
    async fn insert_achievement(&self, achievement: &Achievement) -> Result<(), StoreError>;
    /// A user's achievements, most recent first.
    async fn list_achievements(&self, owner: UserId) -> Result<Vec<Achievement>, StoreError>;

    // ----- notifications -----

    /// Inserts a notification.
    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError>;
    /// A user's notifications, most recent first.
    async fn list_notifications(
        &self,
        owner: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError>;
    /// Marks one of `owner`'s notifications read. Returns whether it exists.
    async fn mark_notification_read(
        &self,
        owner: UserId,
        id: NotificationId,
    ) -> Result<bool, StoreError>;
}
