//! Domain components.
//!
//! Each component embeds a [`ComponentBase`](tally_core::ComponentBase),
//! resolves its dependencies in `on_init` and exposes async operations that the
//! HTTP layer calls directly. Cross-component reactions travel over the bus:
//!
//! ```text
//! log:created/updated ──▶ goal ──▶ goal:achieved ──▶ achievement
//!                                                      │
//!                       notification ◀── achievement:earned
//! ```

pub mod achievement;
pub mod activity;
pub mod auth;
pub mod database;
pub mod goal;
pub mod notification;
mod worker;

pub use achievement::AchievementComponent;
pub use activity::ActivityComponent;
pub use auth::AuthComponent;
pub use database::DatabaseComponent;
pub use goal::GoalComponent;
pub use notification::NotificationComponent;

use crate::error::DomainError;
use std::sync::{Arc, PoisonError, RwLock};

/// Registration names used with the orchestrator.
pub mod names {
    /// [`DatabaseComponent`](super::DatabaseComponent).
    pub const DATABASE: &str = "database";
    /// [`AuthComponent`](super::AuthComponent).
    pub const AUTH: &str = "auth";
    /// [`ActivityComponent`](super::ActivityComponent).
    pub const ACTIVITY: &str = "activity";
    /// [`GoalComponent`](super::GoalComponent).
    pub const GOAL: &str = "goal";
    /// [`AchievementComponent`](super::AchievementComponent).
    pub const ACHIEVEMENT: &str = "achievement";
    /// [`NotificationComponent`](super::NotificationComponent).
    pub const NOTIFICATION: &str = "notification";
}

/// A value resolved during `on_init` and cleared on shutdown.
struct Slot<T: ?Sized> {
    owner: &'static str,
    value: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Slot<T> {
    const fn new(owner: &'static str) -> Self {
        Self {
            owner,
            value: RwLock::new(None),
        }
    }

    fn set(&self, value: Arc<T>) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    fn clear(&self) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn get(&self) -> Result<Arc<T>, DomainError> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DomainError::NotReady(self.owner))
    }
}

/// Trims `value` and rejects it when empty.
fn required(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional value, mapping blank to `None`.
fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_is_not_ready() {
        let slot: Slot<str> = Slot::new("goal");
        assert!(matches!(slot.get(), Err(DomainError::NotReady("goal"))));

        slot.set(Arc::from("ok"));
        assert!(slot.get().is_ok());

        slot.clear();
        assert!(slot.get().is_err());
    }

    #[test]
    fn text_fields_are_trimmed() {
        assert_eq!(required("name", "  Push-ups ").ok().as_deref(), Some("Push-ups"));
        assert!(matches!(required("name", "   "), Err(DomainError::Validation(_))));
        assert_eq!(optional(Some("  ")), None);
        assert_eq!(optional(Some(" note ")).as_deref(), Some("note"));
    }
}
