//! Route table.

use crate::handlers::{activities, goals, health, inbox, users};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

/// Builds the full API router over `state`.
///
/// ```text
/// GET    /health
/// GET    /health/components
/// POST   /api/users                     GET /api/users
/// GET    /api/users/:id                 PATCH, DELETE
/// POST   /api/activities                GET /api/activities
/// GET    /api/activities/:id            PATCH, DELETE
/// POST   /api/activities/:id/logs       GET /api/activities/:id/logs
/// PATCH  /api/logs/:id                  DELETE
/// POST   /api/goals                     GET /api/goals?active=true
/// GET    /api/goals/:id                 PATCH, DELETE
/// GET    /api/goals/:id/progress
/// GET    /api/achievements
/// GET    /api/notifications?unread=true
/// POST   /api/notifications/:id/read
/// ```
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/users", post(users::create_user).get(users::list_users))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/activities",
            post(activities::create_activity).get(activities::list_activities),
        )
        .route(
            "/activities/:id",
            get(activities::get_activity)
                .patch(activities::update_activity)
                .delete(activities::delete_activity),
        )
        .route(
            "/activities/:id/logs",
            post(activities::create_log).get(activities::list_logs),
        )
        .route(
            "/logs/:id",
            patch(activities::update_log).delete(activities::delete_log),
        )
        .route("/goals", post(goals::create_goal).get(goals::list_goals))
        .route(
            "/goals/:id",
            get(goals::get_goal)
                .patch(goals::update_goal)
                .delete(goals::delete_goal),
        )
        .route("/goals/:id/progress", get(goals::goal_progress))
        .route("/achievements", get(inbox::list_achievements))
        .route("/notifications", get(inbox::list_notifications))
        .route(
            "/notifications/:id/read",
            post(inbox::mark_notification_read),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/components", get(health::component_health))
        .nest("/api", api)
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
