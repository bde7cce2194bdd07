//! In-memory [`TrackerStore`] for tests and local runs.

use super::TrackerStore;
use crate::error::StoreError;
use crate::model::{Achievement, Activity, ActivityLog, Goal, Notification, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tally_core::types::{ActivityId, GoalId, LogId, NotificationId, UserId};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    activities: HashMap<ActivityId, Activity>,
    logs: HashMap<LogId, ActivityLog>,
    goals: HashMap<GoalId, Goal>,
    achievements: Vec<Achievement>,
    notifications: Vec<Notification>,
}

/// Thread-safe in-memory store.
///
/// Mirrors the SQL store's semantics: unique usernames and emails, cascading
/// deletes and the conditional completion update.
#[derive(Debug, Default)]
pub struct InMemoryTrackerStore {
    tables: RwLock<Tables>,
}

impl InMemoryTrackerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored log entries, across all users.
    #[must_use]
    pub fn log_count(&self) -> usize {
        self.read().logs.len()
    }
}

fn check_unique_user(tables: &Tables, user: &User) -> Result<(), StoreError> {
    for existing in tables.users.values().filter(|u| u.id != user.id) {
        if existing.username == user.username {
            return Err(StoreError::Conflict(format!(
                "username '{}' is already taken",
                user.username
            )));
        }
        if existing.email == user.email {
            return Err(StoreError::Conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl TrackerStore for InMemoryTrackerStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.write();
        check_unique_user(&tables, user)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.read().users.values().cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.write();
        check_unique_user(&tables, user)?;
        if let Some(existing) = tables.users.get_mut(&user.id) {
            existing.email.clone_from(&user.email);
            existing.display_name.clone_from(&user.display_name);
            existing.updated_at = user.updated_at;
            existing.last_login_at = user.last_login_at;
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let mut tables = self.write();
        let existed = tables.users.remove(&id).is_some();
        tables.activities.retain(|_, a| a.owner_id != id);
        tables.logs.retain(|_, l| l.owner_id != id);
        tables.goals.retain(|_, g| g.owner_id != id);
        tables.achievements.retain(|a| a.owner_id != id);
        tables.notifications.retain(|n| n.owner_id != id);
        Ok(existed)
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        self.write().activities.insert(activity.id, activity.clone());
        Ok(())
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StoreError> {
        Ok(self.read().activities.get(&id).cloned())
    }

    async fn list_activities(&self, owner: UserId) -> Result<Vec<Activity>, StoreError> {
        let mut activities: Vec<Activity> = self
            .read()
            .activities
            .values()
            .filter(|a| a.owner_id == owner)
            .cloned()
            .collect();
        activities.sort_by_key(|a| (a.created_at, a.id));
        Ok(activities)
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        if let Some(existing) = self.write().activities.get_mut(&activity.id) {
            existing.name.clone_from(&activity.name);
            existing.unit.clone_from(&activity.unit);
            existing.description.clone_from(&activity.description);
            existing.updated_at = activity.updated_at;
        }
        Ok(())
    }

    async fn delete_activity(&self, id: ActivityId) -> Result<bool, StoreError> {
        let mut tables = self.write();
        let existed = tables.activities.remove(&id).is_some();
        tables.logs.retain(|_, l| l.activity_id != id);
        let removed_goals: Vec<GoalId> = tables
            .goals
            .values()
            .filter(|g| g.activity_id == id)
            .map(|g| g.id)
            .collect();
        tables.goals.retain(|_, g| g.activity_id != id);
        tables
            .achievements
            .retain(|a| !removed_goals.contains(&a.goal_id));
        Ok(existed)
    }

    async fn insert_log(&self, log: &ActivityLog) -> Result<(), StoreError> {
        self.write().logs.insert(log.id, log.clone());
        Ok(())
    }

    async fn get_log(&self, id: LogId) -> Result<Option<ActivityLog>, StoreError> {
        Ok(self.read().logs.get(&id).cloned())
    }

    async fn list_logs(
        &self,
        owner: UserId,
        activity: ActivityId,
    ) -> Result<Vec<ActivityLog>, StoreError> {
        let mut logs: Vec<ActivityLog> = self
            .read()
            .logs
            .values()
            .filter(|l| l.owner_id == owner && l.activity_id == activity)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.logged_at.cmp(&a.logged_at).then(b.id.cmp(&a.id)));
        Ok(logs)
    }

    async fn logs_between(
        &self,
        owner: UserId,
        activity: ActivityId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityLog>, StoreError> {
        let mut logs: Vec<ActivityLog> = self
            .read()
            .logs
            .values()
            .filter(|l| {
                l.owner_id == owner
                    && l.activity_id == activity
                    && l.logged_at >= start
                    && l.logged_at <= end
            })
            .cloned()
            .collect();
        logs.sort_by_key(|l| (l.logged_at, l.id));
        Ok(logs)
    }

    async fn update_log(&self, log: &ActivityLog) -> Result<(), StoreError> {
        if let Some(existing) = self.write().logs.get_mut(&log.id) {
            existing.count = log.count;
            existing.logged_at = log.logged_at;
            existing.notes.clone_from(&log.notes);
        }
        Ok(())
    }

    async fn delete_log(&self, id: LogId) -> Result<bool, StoreError> {
        Ok(self.write().logs.remove(&id).is_some())
    }

    async fn insert_goal(&self, goal: &Goal) -> Result<(), StoreError> {
        self.write().goals.insert(goal.id, goal.clone());
        Ok(())
    }

    async fn get_goal(&self, id: GoalId) -> Result<Option<Goal>, StoreError> {
        Ok(self.read().goals.get(&id).cloned())
    }

    async fn list_goals(&self, owner: UserId, active_only: bool) -> Result<Vec<Goal>, StoreError> {
        let mut goals: Vec<Goal> = self
            .read()
            .goals
            .values()
            .filter(|g| g.owner_id == owner && (!active_only || g.is_active))
            .cloned()
            .collect();
        goals.sort_by_key(|g| (g.created_at, g.id));
        Ok(goals)
    }

    async fn active_goals_for_activity(
        &self,
        owner: UserId,
        activity: ActivityId,
    ) -> Result<Vec<Goal>, StoreError> {
        let mut goals: Vec<Goal> = self
            .read()
            .goals
            .values()
            .filter(|g| g.owner_id == owner && g.activity_id == activity && g.is_active)
            .cloned()
            .collect();
        goals.sort_by_key(|g| (g.created_at, g.id));
        Ok(goals)
    }

    async fn update_goal(&self, goal: &Goal) -> Result<(), StoreError> {
        if let Some(existing) = self.write().goals.get_mut(&goal.id) {
            existing.target_value = goal.target_value;
            existing.period_type = goal.period_type;
            existing.start_date = goal.start_date;
            existing.end_date = goal.end_date;
            existing.is_active = goal.is_active;
            existing.updated_at = goal.updated_at;
        }
        Ok(())
    }

    async fn delete_goal(&self, id: GoalId) -> Result<bool, StoreError> {
        let mut tables = self.write();
        let existed = tables.goals.remove(&id).is_some();
        tables.achievements.retain(|a| a.goal_id != id);
        Ok(existed)
    }

    async fn mark_goal_completed(&self, id: GoalId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.write();
        match tables.goals.get_mut(&id) {
            Some(goal) if !goal.is_completed => {
                goal.is_completed = true;
                goal.completed_at = Some(at);
                goal.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_achievement(&self, achievement: &Achievement) -> Result<(), StoreError> {
        self.write().achievements.push(achievement.clone());
        Ok(())
    }

    async fn list_achievements(&self, owner: UserId) -> Result<Vec<Achievement>, StoreError> {
        let mut achievements: Vec<Achievement> = self
            .read()
            .achievements
            .iter()
            .filter(|a| a.owner_id == owner)
            .cloned()
            .collect();
        achievements.sort_by(|a, b| b.earned_at.cmp(&a.earned_at));
        Ok(achievements)
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        self.write().notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        owner: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut notifications: Vec<Notification> = self
            .read()
            .notifications
            .iter()
            .filter(|n| n.owner_id == owner && (!unread_only || !n.read))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        owner: UserId,
        id: NotificationId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.write();
        match tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.owner_id == owner)
        {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
