//! `/api/users`.

use crate::error::AppError;
use crate::extractors::{ActingUser, CorrelationId};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tally_core::types::UserId;
use tally_tracker::model::{NewUser, User, UserUpdate};
use tracing::info;

/// `POST /api/users`: registers an account. No acting user is needed.
pub async fn create_user(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.auth.create_user(input).await?;
    info!(%correlation_id, user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /api/users`
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.auth.list_users().await?))
}

/// `GET /api/users/:id`
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.auth.get_user(id).await?))
}

/// `PATCH /api/users/:id`: only the account itself may change it.
pub async fn update_user(
    State(state): State<AppState>,
    acting: ActingUser,
    Path(id): Path<UserId>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, AppError> {
    ensure_self(&acting, id)?;
    Ok(Json(state.auth.update_user(id, update).await?))
}

/// `DELETE /api/users/:id`: removes the account and everything it owns.
pub async fn delete_user(
    State(state): State<AppState>,
    acting: ActingUser,
    Path(id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    ensure_self(&acting, id)?;
    state.auth.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_self(acting: &ActingUser, id: UserId) -> Result<(), AppError> {
    if acting.id() == id {
        Ok(())
    } else {
        Err(AppError::forbidden("Users can only modify their own account"))
    }
}
