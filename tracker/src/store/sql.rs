//! [`TrackerStore`] over a [`QueryExecutor`].
//!
//! Statements target the schema shipped with `tally-postgres`. Nullable
//! parameters carry explicit casts so an untyped `NULL` binds cleanly.

use super::TrackerStore;
use crate::error::StoreError;
use crate::model::{Achievement, Activity, ActivityLog, Goal, Notification, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tally_core::query::{QueryExecutor, Row, RowExt, SqlValue};
use tally_core::types::{
    AchievementId, ActivityId, GoalId, LogId, NotificationId, PeriodType, UserId,
};

const USER_COLUMNS: &str =
    "id, username, email, display_name, created_at, updated_at, last_login_at";
const ACTIVITY_COLUMNS: &str = "id, owner_id, name, unit, description, created_at, updated_at";
const LOG_COLUMNS: &str = "id, owner_id, activity_id, count, logged_at, notes, created_at";
const GOAL_COLUMNS: &str = "id, owner_id, activity_id, target_value, period_type, start_date, \
     end_date, is_active, is_completed, completed_at, created_at, updated_at";
const ACHIEVEMENT_COLUMNS: &str = "id, owner_id, goal_id, title, description, earned_at";
const NOTIFICATION_COLUMNS: &str = "id, owner_id, kind, message, read, created_at";

/// SQL-backed store.
#[derive(Clone)]
pub struct SqlTrackerStore {
    executor: Arc<dyn QueryExecutor>,
}

impl std::fmt::Debug for SqlTrackerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlTrackerStore").finish_non_exhaustive()
    }
}

impl SqlTrackerStore {
    /// Creates a store issuing statements through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    async fn rows(&self, text: &str, params: &[SqlValue]) -> Result<Vec<Row>, StoreError> {
        self.executor
            .query(text, params)
            .await
            .map(|result| result.rows)
            .map_err(StoreError::from_query)
    }

    async fn first(&self, text: &str, params: &[SqlValue]) -> Result<Option<Row>, StoreError> {
        Ok(self.rows(text, params).await?.into_iter().next())
    }

    async fn execute(&self, text: &str, params: &[SqlValue]) -> Result<(), StoreError> {
        self.rows(text, params).await.map(|_| ())
    }

    /// Runs a `... RETURNING id` statement and reports whether a row matched.
    async fn affected(&self, text: &str, params: &[SqlValue]) -> Result<bool, StoreError> {
        Ok(!self.rows(text, params).await?.is_empty())
    }
}

fn user_from_row(row: &Row) -> Result<User, StoreError> {
    Ok(User {
        id: UserId::from_uuid(row.uuid("id")?),
        username: row.text("username")?,
        email: row.text("email")?,
        display_name: row.opt_text("display_name")?,
        created_at: row.timestamp("created_at")?,
        updated_at: row.timestamp("updated_at")?,
        last_login_at: row.opt_timestamp("last_login_at")?,
    })
}

fn activity_from_row(row: &Row) -> Result<Activity, StoreError> {
    Ok(Activity {
        id: ActivityId::from_uuid(row.uuid("id")?),
        owner_id: UserId::from_uuid(row.uuid("owner_id")?),
        name: row.text("name")?,
        unit: row.text("unit")?,
        description: row.opt_text("description")?,
        created_at: row.timestamp("created_at")?,
        updated_at: row.timestamp("updated_at")?,
    })
}

fn log_from_row(row: &Row) -> Result<ActivityLog, StoreError> {
    Ok(ActivityLog {
        id: LogId::from_uuid(row.uuid("id")?),
        owner_id: UserId::from_uuid(row.uuid("owner_id")?),
        activity_id: ActivityId::from_uuid(row.uuid("activity_id")?),
        count: row.float("count")?,
        logged_at: row.timestamp("logged_at")?,
        notes: row.opt_text("notes")?,
        created_at: row.timestamp("created_at")?,
    })
}

fn goal_from_row(row: &Row) -> Result<Goal, StoreError> {
    let raw_period = row.text("period_type")?;
    let period_type: PeriodType = raw_period
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("goal period_type: {e}")))?;
    Ok(Goal {
        id: GoalId::from_uuid(row.uuid("id")?),
        owner_id: UserId::from_uuid(row.uuid("owner_id")?),
        activity_id: ActivityId::from_uuid(row.uuid("activity_id")?),
        target_value: row.float("target_value")?,
        period_type,
        start_date: row.date("start_date")?,
        end_date: row.opt_date("end_date")?,
        is_active: row.boolean("is_active")?,
        is_completed: row.boolean("is_completed")?,
        completed_at: row.opt_timestamp("completed_at")?,
        created_at: row.timestamp("created_at")?,
        updated_at: row.timestamp("updated_at")?,
    })
}

fn achievement_from_row(row: &Row) -> Result<Achievement, StoreError> {
    Ok(Achievement {
        id: AchievementId::from_uuid(row.uuid("id")?),
        owner_id: UserId::from_uuid(row.uuid("owner_id")?),
        goal_id: GoalId::from_uuid(row.uuid("goal_id")?),
        title: row.text("title")?,
        description: row.text("description")?,
        earned_at: row.timestamp("earned_at")?,
    })
}

fn notification_from_row(row: &Row) -> Result<Notification, StoreError> {
    Ok(Notification {
        id: NotificationId::from_uuid(row.uuid("id")?),
        owner_id: UserId::from_uuid(row.uuid("owner_id")?),
        kind: row.text("kind")?,
        message: row.text("message")?,
        read: row.boolean("read")?,
        created_at: row.timestamp("created_at")?,
    })
}

fn collect<T>(
    rows: &[Row],
    decode: fn(&Row) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    rows.iter().map(decode).collect()
}

#[async_trait]
impl TrackerStore for SqlTrackerStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.execute("SELECT 1 AS ok", &[]).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO users (id, username, email, display_name, created_at, updated_at, last_login_at) \
             VALUES ($1, $2, $3, $4::text, $5, $6, $7::timestamptz)",
            &[
                user.id.into(),
                user.username.clone().into(),
                user.email.clone().into(),
                user.display_name.clone().into(),
                user.created_at.into(),
                user.updated_at.into(),
                user.last_login_at.into(),
            ],
        )
        .await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let text = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.first(&text, &[id.into()])
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let text = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        collect(&self.rows(&text, &[]).await?, user_from_row)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.execute(
            "UPDATE users SET email = $2, display_name = $3::text, updated_at = $4, \
             last_login_at = $5::timestamptz WHERE id = $1",
            &[
                user.id.into(),
                user.email.clone().into(),
                user.display_name.clone().into(),
                user.updated_at.into(),
                user.last_login_at.into(),
            ],
        )
        .await
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        self.affected("DELETE FROM users WHERE id = $1 RETURNING id", &[id.into()])
            .await
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO activities (id, owner_id, name, unit, description, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5::text, $6, $7)",
            &[
                activity.id.into(),
                activity.owner_id.into(),
                activity.name.clone().into(),
                activity.unit.clone().into(),
                activity.description.clone().into(),
                activity.created_at.into(),
                activity.updated_at.into(),
            ],
        )
        .await
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StoreError> {
        let text = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1");
        self.first(&text, &[id.into()])
            .await?
            .as_ref()
            .map(activity_from_row)
            .transpose()
    }

    async fn list_activities(&self, owner: UserId) -> Result<Vec<Activity>, StoreError> {
        let text = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE owner_id = $1 ORDER BY created_at, id"
        );
        collect(&self.rows(&text, &[owner.into()]).await?, activity_from_row)
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        self.execute(
            "UPDATE activities SET name = $2, unit = $3, description = $4::text, updated_at = $5 \
             WHERE id = $1",
            &[
                activity.id.into(),
                activity.name.clone().into(),
                activity.unit.clone().into(),
                activity.description.clone().into(),
                activity.updated_at.into(),
            ],
        )
        .await
    }

    async fn delete_activity(&self, id: ActivityId) -> Result<bool, StoreError> {
        self.affected(
            "DELETE FROM activities WHERE id = $1 RETURNING id",
            &[id.into()],
        )
        .await
    }

    async fn insert_log(&self, log: &ActivityLog) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO activity_logs (id, owner_id, activity_id, count, logged_at, notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6::text, $7)",
            &[
                log.id.into(),
                log.owner_id.into(),
                log.activity_id.into(),
                log.count.into(),
                log.logged_at.into(),
                log.notes.clone().into(),
                log.created_at.into(),
            ],
        )
        .await
    }

    async fn get_log(&self, id: LogId) -> Result<Option<ActivityLog>, StoreError> {
        let text = format!("SELECT {LOG_COLUMNS} FROM activity_logs WHERE id = $1");
        self.first(&text, &[id.into()])
            .await?
            .as_ref()
            .map(log_from_row)
            .transpose()
    }

    async fn list_logs(
        &self,
        owner: UserId,
        activity: ActivityId,
    ) -> Result<Vec<ActivityLog>, StoreError> {
        let text = format!(
            "SELECT {LOG_COLUMNS} FROM activity_logs WHERE owner_id = $1 AND activity_id = $2 \
             ORDER BY logged_at DESC, id DESC"
        );
        collect(
            &self.rows(&text, &[owner.into(), activity.into()]).await?,
            log_from_row,
        )
    }

    async fn logs_between(
        &self,
        owner: UserId,
        activity: ActivityId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityLog>, StoreError> {
        let text = format!(
            "SELECT {LOG_COLUMNS} FROM activity_logs WHERE owner_id = $1 AND activity_id = $2 \
             AND logged_at >= $3 AND logged_at <= $4 ORDER BY logged_at, id"
        );
        collect(
            &self
                .rows(
                    &text,
                    &[owner.into(), activity.into(), start.into(), end.into()],
                )
                .await?,
            log_from_row,
        )
    }

    async fn update_log(&self, log: &ActivityLog) -> Result<(), StoreError> {
        self.execute(
            "UPDATE activity_logs SET count = $2, logged_at = $3, notes = $4::text WHERE id = $1",
            &[
                log.id.into(),
                log.count.into(),
                log.logged_at.into(),
                log.notes.clone().into(),
            ],
        )
        .await
    }

    async fn delete_log(&self, id: LogId) -> Result<bool, StoreError> {
        self.affected(
            "DELETE FROM activity_logs WHERE id = $1 RETURNING id",
            &[id.into()],
        )
        .await
    }

    async fn insert_goal(&self, goal: &Goal) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO goals (id, owner_id, activity_id, target_value, period_type, start_date, \
             end_date, is_active, is_completed, completed_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7::date, $8, $9, $10::timestamptz, $11, $12)",
            &[
                goal.id.into(),
                goal.owner_id.into(),
                goal.activity_id.into(),
                goal.target_value.into(),
                goal.period_type.as_str().into(),
                goal.start_date.into(),
                goal.end_date.into(),
                goal.is_active.into(),
                goal.is_completed.into(),
                goal.completed_at.into(),
                goal.created_at.into(),
                goal.updated_at.into(),
            ],
        )
        .await
    }

    async fn get_goal(&self, id: GoalId) -> Result<Option<Goal>, StoreError> {
        let text = format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = $1");
        self.first(&text, &[id.into()])
            .await?
            .as_ref()
            .map(goal_from_row)
            .transpose()
    }

    async fn list_goals(&self, owner: UserId, active_only: bool) -> Result<Vec<Goal>, StoreError> {
        let text = format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE owner_id = $1 AND (is_active OR NOT $2) \
             ORDER BY created_at, id"
        );
        collect(
            &self.rows(&text, &[owner.into(), active_only.into()]).await?,
            goal_from_row,
        )
    }

    async fn active_goals_for_activity(
        &self,
        owner: UserId,
        activity: ActivityId,
    ) -> Result<Vec<Goal>, StoreError> {
        let text = format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE owner_id = $1 AND activity_id = $2 \
             AND is_active ORDER BY created_at, id"
        );
        collect(
            &self.rows(&text, &[owner.into(), activity.into()]).await?,
            goal_from_row,
        )
    }

    async fn update_goal(&self, goal: &Goal) -> Result<(), StoreError> {
        self.execute(
            "UPDATE goals SET target_value = $2, period_type = $3, start_date = $4, \
             end_date = $5::date, is_active = $6, updated_at = $7 WHERE id = $1",
            &[
                goal.id.into(),
                goal.target_value.into(),
                goal.period_type.as_str().into(),
                goal.start_date.into(),
                goal.end_date.into(),
                goal.is_active.into(),
                goal.updated_at.into(),
            ],
        )
        .await
    }

    async fn delete_goal(&self, id: GoalId) -> Result<bool, StoreError> {
        self.affected("DELETE FROM goals WHERE id = $1 RETURNING id", &[id.into()])
            .await
    }

    async fn mark_goal_completed(&self, id: GoalId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.affected(
            "UPDATE goals SET is_completed = true, completed_at = $2, updated_at = $2 \
             WHERE id = $1 AND is_completed = false RETURNING id",
            &[id.into(), at.into()],
        )
        .await
    }

    async fn insert_achievement(&self, achievement: &Achievement) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO achievements (id, owner_id, goal_id, title, description, earned_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                achievement.id.into(),
                achievement.owner_id.into(),
                achievement.goal_id.into(),
                achievement.title.clone().into(),
                achievement.description.clone().into(),
                achievement.earned_at.into(),
            ],
        )
        .await
    }

    async fn list_achievements(&self, owner: UserId) -> Result<Vec<Achievement>, StoreError> {
        let text = format!(
            "SELECT {ACHIEVEMENT_COLUMNS} FROM achievements WHERE owner_id = $1 \
             ORDER BY earned_at DESC, id"
        );
        collect(&self.rows(&text, &[owner.into()]).await?, achievement_from_row)
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO notifications (id, owner_id, kind, message, read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                notification.id.into(),
                notification.owner_id.into(),
                notification.kind.clone().into(),
                notification.message.clone().into(),
                notification.read.into(),
                notification.created_at.into(),
            ],
        )
        .await
    }

    async fn list_notifications(
        &self,
        owner: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let text = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE owner_id = $1 \
             AND (NOT read OR NOT $2) ORDER BY created_at DESC, id"
        );
        collect(
            &self.rows(&text, &[owner.into(), unread_only.into()]).await?,
            notification_from_row,
        )
    }

    async fn mark_notification_read(
        &self,
        owner: UserId,
        id: NotificationId,
    ) -> Result<bool, StoreError> {
        self.affected(
            "UPDATE notifications SET read = true WHERE id = $1 AND owner_id = $2 RETURNING id",
            &[id.into(), owner.into()],
        )
        .await
    }
}
