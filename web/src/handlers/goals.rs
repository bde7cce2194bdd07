//! `/api/goals`.

use crate::error::AppError;
use crate::extractors::ActingUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tally_core::types::GoalId;
use tally_tracker::GoalProgress;
use tally_tracker::model::{Goal, GoalUpdate, NewGoal};

/// Query string of `GET /api/goals`.
#[derive(Debug, Default, Deserialize)]
pub struct GoalFilter {
    /// Only active goals when `true`.
    #[serde(default)]
    pub active: bool,
}

/// `POST /api/goals`
pub async fn create_goal(
    State(state): State<AppState>,
    user: ActingUser,
    Json(input): Json<NewGoal>,
) -> Result<(StatusCode, Json<Goal>), AppError> {
    let goal = state.goals.create_goal(user.id(), input).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

/// `GET /api/goals?active=true`
pub async fn list_goals(
    State(state): State<AppState>,
    user: ActingUser,
    Query(filter): Query<GoalFilter>,
) -> Result<Json<Vec<Goal>>, AppError> {
    Ok(Json(state.goals.list_goals(user.id(), filter.active).await?))
}

/// `GET /api/goals/:id`
pub async fn get_goal(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<GoalId>,
) -> Result<Json<Goal>, AppError> {
    Ok(Json(state.goals.get_goal(user.id(), id).await?))
}

/// `PATCH /api/goals/:id`
pub async fn update_goal(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<GoalId>,
    Json(update): Json<GoalUpdate>,
) -> Result<Json<Goal>, AppError> {
    Ok(Json(state.goals.update_goal(user.id(), id, update).await?))
}

/// `DELETE /api/goals/:id`
pub async fn delete_goal(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<GoalId>,
) -> Result<StatusCode, AppError> {
    state.goals.delete_goal(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/goals/:id/progress`: progress in the current period.
pub async fn goal_progress(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<GoalId>,
) -> Result<Json<GoalProgress>, AppError> {
    Ok(Json(state.goals.goal_progress(user.id(), id).await?))
}
