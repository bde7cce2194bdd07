//! `/api/achievements` and `/api/notifications`.

use crate::error::AppError;
use crate::extractors::ActingUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tally_core::types::NotificationId;
use tally_tracker::model::{Achievement, Notification};

/// Query string of `GET /api/notifications`.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilter {
    /// Only unread notifications when `true`.
    #[serde(default)]
    pub unread: bool,
}

/// `GET /api/achievements`
pub async fn list_achievements(
    State(state): State<AppState>,
    user: ActingUser,
) -> Result<Json<Vec<Achievement>>, AppError> {
    Ok(Json(state.achievements.list_achievements(user.id()).await?))
}

/// `GET /api/notifications?unread=true`
pub async fn list_notifications(
    State(state): State<AppState>,
    user: ActingUser,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(
        state
            .notifications
            .list_notifications(user.id(), filter.unread)
            .await?,
    ))
}

/// `POST /api/notifications/:id/read`
pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, AppError> {
    state.notifications.mark_read(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
