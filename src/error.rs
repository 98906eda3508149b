use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::{ErrorResponse, MatchStatus, RequestStatus};

/// Errors raised by the storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("request cannot move from {from} to {to}")]
    InvalidRequestTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("match cannot move from {from} to {to}")]
    InvalidMatchTransition { from: MatchStatus, to: MatchStatus },

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Failures that may go away on retry
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) | StoreError::Timeout(_) => true,
            StoreError::SqlxError(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

/// Error taxonomy of the matching core, mapped onto HTTP statuses at the boundary
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("service temporarily unavailable: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::Transient(_))
    }
}

impl From<StoreError> for MatchError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            return MatchError::Transient(err.to_string());
        }
        match err {
            StoreError::InvalidRequestTransition { .. }
            | StoreError::InvalidMatchTransition { .. }
            | StoreError::Duplicate(_) => MatchError::Conflict(err.to_string()),
            other => MatchError::Internal(other.to_string()),
        }
    }
}

impl ResponseError for MatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            MatchError::BadRequest(_) => StatusCode::BAD_REQUEST,
            MatchError::NotFound(_) => StatusCode::NOT_FOUND,
            MatchError::Forbidden(_) => StatusCode::FORBIDDEN,
            MatchError::Conflict(_) => StatusCode::CONFLICT,
            MatchError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            MatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            MatchError::Transient(detail) => {
                tracing::warn!("Transient failure surfaced to client: {}", detail);
                "Service temporarily unavailable, please retry".to_string()
            }
            MatchError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(MatchError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(MatchError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(MatchError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(MatchError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            MatchError::Transient("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            MatchError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_classified() {
        let timeout: MatchError = StoreError::Timeout(Duration::from_millis(50)).into();
        assert!(timeout.is_retryable());

        let pool: MatchError = StoreError::SqlxError(sqlx::Error::PoolTimedOut).into();
        assert!(pool.is_retryable());

        let transition: MatchError = StoreError::InvalidMatchTransition {
            from: MatchStatus::Rejected,
            to: MatchStatus::Accepted,
        }
        .into();
        assert!(matches!(transition, MatchError::Conflict(_)));

        let row: MatchError = StoreError::SqlxError(sqlx::Error::RowNotFound).into();
        assert!(matches!(row, MatchError::Internal(_)));
    }
}
