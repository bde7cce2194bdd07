//! User-facing notifications.

use super::worker::JobQueue;
use super::{DatabaseComponent, Slot, names};
use crate::error::DomainError;
use crate::model::Notification;
use crate::store::TrackerStore;
use async_trait::async_trait;
use std::sync::Arc;
use tally_core::component::{Component, ComponentBase, ComponentError};
use tally_core::environment::Clock;
use tally_core::event::{AchievementEvent, AppEvent, EventKind, NotificationEvent};
use tally_core::event_bus::EventBus;
use tally_core::types::{NotificationId, UserId};
use tracing::debug;

/// Work item: tell `user` about something.
#[derive(Debug, Clone)]
struct Notice {
    user: UserId,
    kind: &'static str,
    message: String,
}

/// Turns `achievement:earned` into a stored notification and publishes
/// `notification:created`.
///
/// Depends on [`names::DATABASE`].
pub struct NotificationComponent {
    base: ComponentBase,
    clock: Arc<dyn Clock>,
    store: Slot<dyn TrackerStore>,
    queue: JobQueue<Notice>,
}

impl NotificationComponent {
    /// Creates the component.
    pub fn new(bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            base: ComponentBase::new(names::NOTIFICATION, bus),
            clock,
            store: Slot::new(names::NOTIFICATION),
            queue: JobQueue::new(names::NOTIFICATION),
        }
    }

    /// `user`'s notifications, most recent first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub async fn list_notifications(
        &self,
        user: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, DomainError> {
        Ok(self.store.get()?.list_notifications(user, unread_only).await?)
    }

    /// Marks one of `user`'s notifications read.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when `user` has no such notification.
    pub async fn mark_read(&self, user: UserId, id: NotificationId) -> Result<(), DomainError> {
        if self.store.get()?.mark_notification_read(user, id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("Notification", id))
        }
    }

    /// Waits until every notification queued so far is stored.
    pub async fn settle(&self) {
        self.queue.settle().await;
    }
}

async fn deliver(
    store: &dyn TrackerStore,
    bus: &EventBus,
    clock: &dyn Clock,
    notice: Notice,
) -> Result<(), DomainError> {
    let notification = Notification {
        id: NotificationId::new(),
        owner_id: notice.user,
        kind: notice.kind.to_string(),
        message: notice.message,
        read: false,
        created_at: clock.now(),
    };
    store.insert_notification(&notification).await?;
    debug!(notification_id = %notification.id, user_id = %notification.owner_id, "Notification stored");

    bus.publish(&AppEvent::Notification(NotificationEvent::Created {
        user_id: notification.owner_id,
        notification_id: notification.id,
        message: notification.message,
        timestamp: notification.created_at,
    }));
    Ok(())
}

#[async_trait]
impl Component for NotificationComponent {
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
            self.queue.start(self.base.reporter(), move |notice| {
                let store = Arc::clone(&store);
                let bus = bus.clone();
                let clock = Arc::clone(&clock);
                async move { deliver(store.as_ref(), &bus, clock.as_ref(), notice).await }
            })
        };
        self.base.subscribe(EventKind::AchievementEarned, move |event| match event {
            AppEvent::Achievement(AchievementEvent::Earned { user_id, title, .. }) => {
                jobs.send(Notice {
                    user: *user_id,
                    kind: "achievement",
                    message: format!("You earned an achievement: {title}"),
                })
            }
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
