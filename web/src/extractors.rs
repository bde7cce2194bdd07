//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request's correlation id
//! - [`ActingUser`]: the user named by the `x-user-id` header

use crate::error::AppError;
use crate::middleware::{CORRELATION_ID_HEADER, parse_correlation_id};
use crate::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tally_core::types::UserId;
use tally_tracker::DomainError;
use tally_tracker::model::User;
use uuid::Uuid;

/// Header carrying the acting user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Correlation ID for request tracing.
///
/// Uses the id stored by [`correlation_id_layer`](crate::correlation_id_layer)
/// when installed, then the `X-Correlation-ID` header, then a fresh UUID.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts
            .extensions
            .get::<Uuid>()
            .copied()
            .or_else(|| parse_correlation_id(parts.headers.get(CORRELATION_ID_HEADER)))
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// The registered user a request acts for.
///
/// Every `/api` route except user registration and listing takes one.
/// Rejections:
///
/// - header missing: 401
/// - not a UUID: 400
/// - no such user: 401
#[derive(Debug, Clone)]
pub struct ActingUser(pub User);

impl ActingUser {
    /// The user's id.
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.0.id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ActingUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::unauthorized(format!("Missing {USER_ID_HEADER} header")))?;
        let id: UserId = raw
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(|| AppError::bad_request(format!("Invalid {USER_ID_HEADER} header")))?;

        match state.auth.get_user(id).await {
            Ok(user) => Ok(Self(user)),
            Err(DomainError::NotFound { .. }) => Err(AppError::unauthorized("Unknown user")),
            Err(err) => Err(err.into()),
        }
    }
}
