//! Account registry.
//!
//! Keeps user records and publishes `user:*` events. Credentials and
//! sessions are out of scope; login and logout only stamp and announce.

use super::{DatabaseComponent, Slot, names, optional, required};
use crate::error::DomainError;
use crate::model::{NewUser, User, UserUpdate};
use crate::store::TrackerStore;
use async_trait::async_trait;
use std::sync::Arc;
use tally_core::component::{Component, ComponentBase, ComponentError};
use tally_core::environment::Clock;
use tally_core::event::{AppEvent, UserEvent};
use tally_core::event_bus::EventBus;
use tally_core::types::UserId;
use tracing::info;

/// User account operations.
pub struct AuthComponent {
    base: ComponentBase,
    clock: Arc<dyn Clock>,
    store: Slot<dyn TrackerStore>,
}

impl AuthComponent {
    /// Creates the component. Depends on [`names::DATABASE`].
    pub fn new(bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            base: ComponentBase::new(names::AUTH, bus),
            clock,
            store: Slot::new(names::AUTH),
        }
    }

    /// Registers a user.
    ///
    /// # Errors
    ///
    /// [`DomainError::Validation`] for a blank username or malformed email,
    /// [`DomainError::Conflict`] when either is taken.
    pub async fn create_user(&self, input: NewUser) -> Result<User, DomainError> {
        let store = self.store.get()?;
        let username = required("username", &input.username)?;
        let email = validate_email(&input.email)?;
        let now = self.clock.now();

        let user = User {
            id: UserId::new(),
            username,
            email,
            display_name: optional(input.display_name.as_deref()),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        store.insert_user(&user).await?;

        info!(user_id = %user.id, username = %user.username, "User created");
        self.base.publish(&AppEvent::User(UserEvent::Created {
            user_id: user.id,
            username: user.username.clone(),
            timestamp: now,
        }));
        Ok(user)
    }

    /// Loads a user.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when no such user exists.
    pub async fn get_user(&self, id: UserId) -> Result<User, DomainError> {
        self.store
            .get()?
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    /// All users, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list_users(&self) -> Result<Vec<User>, DomainError> {
        Ok(self.store.get()?.list_users().await?)
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`], [`DomainError::Validation`] or
    /// [`DomainError::Conflict`].
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, DomainError> {
        let store = self.store.get()?;
        let mut user = self.get_user(id).await?;

        if let Some(email) = update.email.as_deref() {
            user.email = validate_email(email)?;
        }
        if let Some(display_name) = update.display_name.as_deref() {
            user.display_name = optional(Some(display_name));
        }
        user.updated_at = self.clock.now();
        store.update_user(&user).await?;

        self.base.publish(&AppEvent::User(UserEvent::Updated {
            user_id: id,
            timestamp: user.updated_at,
        }));
        Ok(user)
    }

    /// Deletes a user and everything they own.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when no such user exists.
    pub async fn delete_user(&self, id: UserId) -> Result<(), DomainError> {
        if !self.store.get()?.delete_user(id).await? {
            return Err(DomainError::not_found("User", id));
        }
        info!(user_id = %id, "User deleted");
        self.base.publish(&AppEvent::User(UserEvent::Deleted {
            user_id: id,
            timestamp: self.clock.now(),
        }));
        Ok(())
    }

    /// Stamps `last_login_at` and publishes `user:login`.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when no such user exists.
    pub async fn record_login(&self, id: UserId) -> Result<User, DomainError> {
        let store = self.store.get()?;
        let mut user = self.get_user(id).await?;
        let now = self.clock.now();
        user.last_login_at = Some(now);
        store.update_user(&user).await?;

        self.base.publish(&AppEvent::User(UserEvent::Login {
            user_id: id,
            timestamp: now,
        }));
        Ok(user)
    }

    /// Publishes `user:logout`.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when no such user exists.
    pub async fn record_logout(&self, id: UserId) -> Result<(), DomainError> {
        self.get_user(id).await?;
        self.base.publish(&AppEvent::User(UserEvent::Logout {
            user_id: id,
            timestamp: self.clock.now(),
        }));
        Ok(())
    }
}

fn validate_email(raw: &str) -> Result<String, DomainError> {
    let email = required("email", raw)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(DomainError::Validation(format!("'{email}' is not an email address"))),
    }
}

#[async_trait]
impl Component for AuthComponent {
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
