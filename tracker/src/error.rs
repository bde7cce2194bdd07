//! Error types for the tracker domain.

use tally_core::query::QueryError;
use thiserror::Error;

/// Errors from a [`TrackerStore`](crate::store::TrackerStore).
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The executor failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored record could not be interpreted.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Classifies executor failures, turning unique-key violations into
    /// [`StoreError::Conflict`].
    #[must_use]
    pub fn from_query(error: QueryError) -> Self {
        match &error {
            QueryError::Execution(message) if message.contains("duplicate key") => {
                Self::Conflict(message.clone())
            }
            _ => Self::Query(error),
        }
    }
}

/// Errors returned by domain component operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// The entity does not exist, or is not visible to the acting user.
    #[error("{entity} not found")]
    NotFound {
        /// Entity kind, e.g. `"Goal"`.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The entity exists but belongs to someone else.
    #[error("{0}")]
    NotOwned(String),

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A goal target that is not strictly positive.
    #[error("Goal target must be greater than zero, got {0}")]
    InvalidTarget(f64),

    /// A uniqueness conflict, e.g. a taken username.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The component has not been initialized.
    #[error("Component '{0}' is not ready")]
    NotReady(&'static str),

    /// Storage failed.
    #[error(transparent)]
    Store(StoreError),
}

impl DomainError {
    /// Shorthand for [`DomainError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(message) => Self::Conflict(message),
            other => Self::Store(other),
        }
    }
}
