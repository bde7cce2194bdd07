//! Health check endpoints.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tally_runtime::{AppStatus, HealthSnapshot};

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthSummary {
    /// Overall application status.
    pub status: AppStatus,
    /// Seconds since startup.
    pub uptime_seconds: i64,
}

/// Liveness and readiness in one.
///
/// ```text
/// GET /health
/// ```
///
/// 200 while the application is running, 503 otherwise.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthSummary>) {
    let snapshot = state.health.snapshot();
    let summary = HealthSummary {
        status: snapshot.status,
        uptime_seconds: snapshot.uptime_seconds,
    };
    (status_code(snapshot.status), Json(summary))
}

/// Full health record with per-component entries.
///
/// ```text
/// GET /health/components
/// ```
pub async fn component_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthSnapshot>) {
    let snapshot = state.health.snapshot();
    (status_code(snapshot.status), Json(snapshot))
}

const fn status_code(status: AppStatus) -> StatusCode {
    if status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_running_is_healthy() {
        assert_eq!(status_code(AppStatus::Running), StatusCode::OK);
        for status in [
            AppStatus::Initializing,
            AppStatus::Starting,
            AppStatus::ShuttingDown,
            AppStatus::Stopped,
            AppStatus::Error,
        ] {
            assert_eq!(status_code(status), StatusCode::SERVICE_UNAVAILABLE);
        }
    }
}
