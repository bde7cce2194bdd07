//! The closed catalog of events carried by the [`EventBus`](crate::event_bus::EventBus).
//!
//! Events are grouped by the producer that emits them. Every event has a
//! stable string name (`"log:created"`, `"goal:achieved"`, ...) returned by
//! [`AppEvent::name`], and a flat [`EventKind`] used as the subscription key.
//!
//! Payload fields serialize in camelCase:
//!
//! ```
//! use tally_core::event::{AppEvent, GoalAchieved, GoalEvent};
//! use tally_core::types::{GoalId, PeriodType, UserId};
//!
//! let event = AppEvent::Goal(GoalEvent::Achieved(GoalAchieved {
//!     user_id: UserId::new(),
//!     goal_id: GoalId::new(),
//!     goal_name: "Push-ups".into(),
//!     goal_target: 50.0,
//!     goal_unit: "reps".into(),
//!     goal_period: PeriodType::Weekly,
//!     timestamp: chrono::Utc::now(),
//! }));
//!
//! let json = serde_json::to_value(&event).unwrap();
//! assert_eq!(json["event"], "goal:achieved");
//! assert_eq!(json["data"]["goalUnit"], "reps");
//! ```

use crate::component::ErrorPhase;
use crate::types::{AchievementId, ActivityId, GoalId, LogId, NotificationId, PeriodType, UserId};
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Subscription key: one variant per event name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EventKind {
    ComponentInitialized,
    ComponentError,
    AppReady,
    AppError,
    AppShutdown,
    UserCreated,
    UserUpdated,
    UserDeleted,
    UserLogin,
    UserLogout,
    UserPasswordChanged,
    UserPasswordResetRequested,
    UserPasswordResetCompleted,
    ActivityCreated,
    ActivityUpdated,
    ActivityDeleted,
    LogCreated,
    LogUpdated,
    LogDeleted,
    GoalCreated,
    GoalUpdated,
    GoalDeleted,
    GoalAchieved,
    AchievementEarned,
    NotificationCreated,
}

impl EventKind {
    /// The stable wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ComponentInitialized => "component:initialized",
            Self::ComponentError => "component:error",
            Self::AppReady => "app:ready",
            Self::AppError => "app:error",
            Self::AppShutdown => "app:shutdown",
            Self::UserCreated => "user:created",
            Self::UserUpdated => "user:updated",
            Self::UserDeleted => "user:deleted",
            Self::UserLogin => "user:login",
            Self::UserLogout => "user:logout",
            Self::UserPasswordChanged => "user:password_changed",
            Self::UserPasswordResetRequested => "user:password_reset_requested",
            Self::UserPasswordResetCompleted => "user:password_reset_completed",
            Self::ActivityCreated => "activity:created",
            Self::ActivityUpdated => "activity:updated",
            Self::ActivityDeleted => "activity:deleted",
            Self::LogCreated => "log:created",
            Self::LogUpdated => "log:updated",
            Self::LogDeleted => "log:deleted",
            Self::GoalCreated => "goal:created",
            Self::GoalUpdated => "goal:updated",
            Self::GoalDeleted => "goal:deleted",
            Self::GoalAchieved => "goal:achieved",
            Self::AchievementEarned => "achievement:earned",
            Self::NotificationCreated => "notification:created",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events emitted by components themselves.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ComponentEvent {
    /// `component:initialized`
    Initialized {
        /// Component name.
        name: String,
    },
    /// `component:error`
    Error {
        /// Component name.
        name: String,
        /// Rendered error message.
        error: String,
        /// Where the failure happened.
        phase: ErrorPhase,
    },
}

/// Application-wide lifecycle events emitted by the orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum AppLifecycleEvent {
    /// `app:ready`
    Ready {
        /// When startup completed.
        timestamp: DateTime<Utc>,
        /// Components in the order they were initialized.
        components: Vec<String>,
    },
    /// `app:error`
    Error {
        /// Component that reported the failure.
        component: String,
        /// Rendered error message.
        error: String,
        /// Where the failure happened.
        phase: ErrorPhase,
    },
    /// `app:shutdown`
    Shutdown {
        /// When teardown started.
        timestamp: DateTime<Utc>,
    },
}

/// Account events emitted by the auth component.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
#[allow(missing_docs)]
pub enum UserEvent {
    Created {
        user_id: UserId,
        username: String,
        timestamp: DateTime<Utc>,
    },
    Updated {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    Deleted {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    Login {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    Logout {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    PasswordChanged {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    PasswordResetRequested {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
    PasswordResetCompleted {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },
}

/// Activity definition events.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
#[allow(missing_docs)]
pub enum ActivityEvent {
    Created {
        user_id: UserId,
        activity_id: ActivityId,
        name: String,
        unit: String,
        timestamp: DateTime<Utc>,
    },
    Updated {
        user_id: UserId,
        activity_id: ActivityId,
        timestamp: DateTime<Utc>,
    },
    Deleted {
        user_id: UserId,
        activity_id: ActivityId,
        timestamp: DateTime<Utc>,
    },
}

/// Activity log events. `Created` and `Updated` drive goal recomputation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
#[allow(missing_docs)]
pub enum LogEvent {
    Created {
        user_id: UserId,
        activity_id: ActivityId,
        log_id: LogId,
        count: f64,
        logged_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    Updated {
        user_id: UserId,
        activity_id: ActivityId,
        log_id: LogId,
        count: f64,
        logged_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    Deleted {
        user_id: UserId,
        activity_id: ActivityId,
        log_id: LogId,
        timestamp: DateTime<Utc>,
    },
}

/// Payload of `goal:achieved`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAchieved {
    /// Goal owner.
    pub user_id: UserId,
    /// The goal that completed.
    pub goal_id: GoalId,
    /// Name of the goal's activity.
    pub goal_name: String,
    /// Target count that was reached.
    pub goal_target: f64,
    /// Unit of the goal's activity.
    pub goal_unit: String,
    /// Goal period.
    pub goal_period: PeriodType,
    /// When completion was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Goal events.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
#[allow(missing_docs)]
pub enum GoalEvent {
    Created {
        user_id: UserId,
        goal_id: GoalId,
        activity_id: ActivityId,
        timestamp: DateTime<Utc>,
    },
    Updated {
        user_id: UserId,
        goal_id: GoalId,
        timestamp: DateTime<Utc>,
    },
    Deleted {
        user_id: UserId,
        goal_id: GoalId,
        timestamp: DateTime<Utc>,
    },
    Achieved(GoalAchieved),
}

/// Achievement events.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
#[allow(missing_docs)]
pub enum AchievementEvent {
    Earned {
        user_id: UserId,
        achievement_id: AchievementId,
        goal_id: GoalId,
        title: String,
        timestamp: DateTime<Utc>,
    },
}

/// Notification events.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
#[allow(missing_docs)]
pub enum NotificationEvent {
    Created {
        user_id: UserId,
        notification_id: NotificationId,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Every event that can travel over the bus.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum AppEvent {
    Component(ComponentEvent),
    App(AppLifecycleEvent),
    User(UserEvent),
    Activity(ActivityEvent),
    Log(LogEvent),
    Goal(GoalEvent),
    Achievement(AchievementEvent),
    Notification(NotificationEvent),
}

impl AppEvent {
    /// The flat kind used to route this event to subscribers.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Component(event) => match event {
                ComponentEvent::Initialized { .. } => EventKind::ComponentInitialized,
                ComponentEvent::Error { .. } => EventKind::ComponentError,
            },
            Self::App(event) => match event {
                AppLifecycleEvent::Ready { .. } => EventKind::AppReady,
                AppLifecycleEvent::Error { .. } => EventKind::AppError,
                AppLifecycleEvent::Shutdown { .. } => EventKind::AppShutdown,
            },
            Self::User(event) => match event {
                UserEvent::Created { .. } => EventKind::UserCreated,
                UserEvent::Updated { .. } => EventKind::UserUpdated,
                UserEvent::Deleted { .. } => EventKind::UserDeleted,
                UserEvent::Login { .. } => EventKind::UserLogin,
                UserEvent::Logout { .. } => EventKind::UserLogout,
                UserEvent::PasswordChanged { .. } => EventKind::UserPasswordChanged,
                UserEvent::PasswordResetRequested { .. } => EventKind::UserPasswordResetRequested,
                UserEvent::PasswordResetCompleted { .. } => EventKind::UserPasswordResetCompleted,
            },
            Self::Activity(event) => match event {
                ActivityEvent::Created { .. } => EventKind::ActivityCreated,
                ActivityEvent::Updated { .. } => EventKind::ActivityUpdated,
                ActivityEvent::Deleted { .. } => EventKind::ActivityDeleted,
            },
            Self::Log(event) => match event {
                LogEvent::Created { .. } => EventKind::LogCreated,
                LogEvent::Updated { .. } => EventKind::LogUpdated,
                LogEvent::Deleted { .. } => EventKind::LogDeleted,
            },
            Self::Goal(event) => match event {
                GoalEvent::Created { .. } => EventKind::GoalCreated,
                GoalEvent::Updated { .. } => EventKind::GoalUpdated,
                GoalEvent::Deleted { .. } => EventKind::GoalDeleted,
                GoalEvent::Achieved(_) => EventKind::GoalAchieved,
            },
            Self::Achievement(AchievementEvent::Earned { .. }) => EventKind::AchievementEarned,
            Self::Notification(NotificationEvent::Created { .. }) => {
                EventKind::NotificationCreated
            }
        }
    }

    /// Stable event name, e.g. `"log:created"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl Serialize for AppEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AppEvent", 2)?;
        state.serialize_field("event", self.name())?;
        match self {
            Self::Component(data) => state.serialize_field("data", data)?,
            Self::App(data) => state.serialize_field("data", data)?,
            Self::User(data) => state.serialize_field("data", data)?,
            Self::Activity(data) => state.serialize_field("data", data)?,
            Self::Log(data) => state.serialize_field("data", data)?,
            Self::Goal(data) => state.serialize_field("data", data)?,
            Self::Achievement(data) => state.serialize_field("data", data)?,
            Self::Notification(data) => state.serialize_field("data", data)?,
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn names_follow_producer_prefix() {
        let user_id = UserId::new();
        let now = Utc::now();

        let log = AppEvent::Log(LogEvent::Created {
            user_id,
            activity_id: ActivityId::new(),
            log_id: LogId::new(),
            count: 20.0,
            logged_at: now,
            timestamp: now,
        });
        assert_eq!(log.kind(), EventKind::LogCreated);
        assert_eq!(log.name(), "log:created");

        let reset = AppEvent::User(UserEvent::PasswordResetRequested {
            user_id,
            timestamp: now,
        });
        assert_eq!(reset.name(), "user:password_reset_requested");
    }

    #[test]
    fn component_error_payload_uses_lowercase_phase() {
        let event = AppEvent::Component(ComponentEvent::Error {
            name: "database".into(),
            error: "connection refused".into(),
            phase: ErrorPhase::Init,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "component:error");
        assert_eq!(json["data"]["phase"], "init");
        assert_eq!(json["data"]["name"], "database");
    }

    #[test]
    fn log_payload_is_camel_case() {
        let now = Utc::now();
        let event = AppEvent::Log(LogEvent::Deleted {
            user_id: UserId::new(),
            activity_id: ActivityId::new(),
            log_id: LogId::new(),
            timestamp: now,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert!(json["data"].get("logId").is_some());
        assert!(json["data"].get("activityId").is_some());
        assert!(json["data"].get("log_id").is_none());
    }
}
