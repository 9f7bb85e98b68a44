//! Error types for the portal.
//!
//! Authentication failures stay inside the gate, storage failures come out of the
//! repository, and `ApiError` is the single type handlers return. Every variant
//! renders as an explicit status code with a JSON `{ "message": ... }` body.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Authentication gate failures. Both render as `401 Unauthorized`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// No authorization header on a protected request
    #[error("Missing authorization header")]
    MissingCredential,

    /// Bad signature, expired, malformed, unknown principal or verification timeout
    #[error("Invalid or expired token")]
    InvalidCredential,
}

/// Resource store failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepoError {
    /// No record with that identifier; the payload names the missing side
    #[error("{0} not found")]
    NotFound(String),

    /// Unique key collision or duplicate relationship entry
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The backing store could not be reached or rejected the statement
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::AlreadyExists(db.constraint().unwrap_or("record").to_string())
            }
            _ => RepoError::StorageUnavailable(e.to_string()),
        }
    }
}

/// Handler-level error. Converted into a response at the request boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Sign-in with an unknown username or a wrong password
    #[error("Invalid username or password")]
    InvalidLogin,

    /// Authenticated, but the role or ownership check failed
    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Unparseable bodies and path segments get the same JSON body as every other error.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// ErrorBody
///
/// JSON shape of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) | ApiError::InvalidLogin => StatusCode::UNAUTHORIZED,
            ApiError::Repo(RepoError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Repo(RepoError::AlreadyExists(_)) => StatusCode::CONFLICT,
            ApiError::Repo(RepoError::StorageUnavailable(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::Auth(self).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details are logged, not leaked to the client.
        let message = match &self {
            ApiError::Repo(RepoError::StorageUnavailable(detail)) => {
                tracing::error!(%detail, "storage unavailable");
                "Storage unavailable".to_string()
            }
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(AuthError::MissingCredential).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(RepoError::NotFound("course".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(RepoError::AlreadyExists("user".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(RepoError::StorageUnavailable("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_not_found_message_names_entity() {
        assert_eq!(RepoError::NotFound("course".into()).to_string(), "course not found");
    }

    #[tokio::test]
    async fn test_storage_detail_is_not_exposed() {
        let response =
            ApiError::from(RepoError::StorageUnavailable("password=hunter2".into())).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.message, "Storage unavailable");
    }
}
