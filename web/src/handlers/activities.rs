//! `/api/activities` and `/api/logs`.

use crate::error::AppError;
use crate::extractors::ActingUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tally_core::types::{ActivityId, LogId};
use tally_tracker::model::{Activity, ActivityLog, ActivityUpdate, LogUpdate, NewActivity, NewLog};

/// `POST /api/activities`
pub async fn create_activity(
    State(state): State<AppState>,
    user: ActingUser,
    Json(input): Json<NewActivity>,
) -> Result<(StatusCode, Json<Activity>), AppError> {
    let activity = state.activities.create_activity(user.id(), input).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

/// `GET /api/activities`
pub async fn list_activities(
    State(state): State<AppState>,
    user: ActingUser,
) -> Result<Json<Vec<Activity>>, AppError> {
    Ok(Json(state.activities.list_activities(user.id()).await?))
}

/// `GET /api/activities/:id`
pub async fn get_activity(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<ActivityId>,
) -> Result<Json<Activity>, AppError> {
    Ok(Json(state.activities.get_activity(user.id(), id).await?))
}

/// `PATCH /api/activities/:id`
pub async fn update_activity(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<ActivityId>,
    Json(update): Json<ActivityUpdate>,
) -> Result<Json<Activity>, AppError> {
    Ok(Json(
        state.activities.update_activity(user.id(), id, update).await?,
    ))
}

/// `DELETE /api/activities/:id`
pub async fn delete_activity(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<ActivityId>,
) -> Result<StatusCode, AppError> {
    state.activities.delete_activity(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/activities/:id/logs`: records a count and triggers goal
/// recomputation in the background.
pub async fn create_log(
    State(state): State<AppState>,
    user: ActingUser,
    Path(activity_id): Path<ActivityId>,
    Json(input): Json<NewLog>,
) -> Result<(StatusCode, Json<ActivityLog>), AppError> {
    let log = state
        .activities
        .log_activity(user.id(), activity_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// `GET /api/activities/:id/logs`
pub async fn list_logs(
    State(state): State<AppState>,
    user: ActingUser,
    Path(activity_id): Path<ActivityId>,
) -> Result<Json<Vec<ActivityLog>>, AppError> {
    Ok(Json(
        state.activities.list_logs(user.id(), activity_id).await?,
    ))
}

/// `PATCH /api/logs/:id`
pub async fn update_log(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<LogId>,
    Json(update): Json<LogUpdate>,
) -> Result<Json<ActivityLog>, AppError> {
    Ok(Json(state.activities.update_log(user.id(), id, update).await?))
}

/// `DELETE /api/logs/:id`
pub async fn delete_log(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<LogId>,
) -> Result<StatusCode, AppError> {
    state.activities.delete_log(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
