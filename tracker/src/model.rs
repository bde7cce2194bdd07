//! Persistent entities and the inputs that create or change them.
//!
//! Field names match the storage columns and the JSON bodies of the HTTP API.

#![allow(missing_docs)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tally_core::types::{
    AchievementId, ActivityId, GoalId, LogId, NotificationId, PeriodType, UserId,
};

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Partial user update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Something a user counts: push-ups, minutes of reading, miles run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub owner_id: UserId,
    pub name: String,
    /// Unit the counts are measured in, e.g. `"reps"`.
    pub unit: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActivity {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial activity update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One recorded count against an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: LogId,
    pub owner_id: UserId,
    pub activity_id: ActivityId,
    pub count: f64,
    /// When the activity happened (not when it was recorded).
    pub logged_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for logging an activity. `logged_at` defaults to now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLog {
    pub count: f64,
    #[serde(default)]
    pub logged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial log update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogUpdate {
    #[serde(default)]
    pub count: Option<f64>,
    #[serde(default)]
    pub logged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A target count for an activity over a recurring or custom period.
///
/// `is_completed` flips to `true` once, the first time progress reaches
/// 100%, and never reverts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub owner_id: UserId,
    pub activity_id: ActivityId,
    pub target_value: f64,
    pub period_type: PeriodType,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a goal. `start_date` defaults to today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGoal {
    pub activity_id: ActivityId,
    pub target_value: f64,
    pub period_type: PeriodType,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// Partial goal update. Completion state is not updatable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalUpdate {
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub period_type: Option<PeriodType>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// `None` keeps the end date, `Some(None)` clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Reads a present field, `null` included, as `Some`. Absent fields fall
/// back to `#[serde(default)]`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Earned when a goal first completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: AchievementId,
    pub owner_id: UserId,
    pub goal_id: GoalId,
    pub title: String,
    pub description: String,
    pub earned_at: DateTime<Utc>,
}

/// A message shown to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub owner_id: UserId,
    /// Category, e.g. `"achievement"`.
    pub kind: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
