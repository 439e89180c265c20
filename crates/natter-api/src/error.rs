use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use natter_types::api::ErrorBody;

use crate::messages::MAX_MESSAGE_CHARS;

/// Failures of signup, login and logout.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username and password must both be longer than two characters")]
    InvalidInput,

    #[error("user already exists")]
    AlreadyExists,

    #[error("no such user")]
    NotFound,

    #[error("password does not match")]
    BadCredential,

    #[error("no active session")]
    NoSession,

    #[error("storage failure")]
    StorageFailure(#[source] anyhow::Error),
}

/// Failures of the chat log.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    Empty,

    #[error("message is longer than {} characters", MAX_MESSAGE_CHARS)]
    TooLong,

    #[error("message not found")]
    NotFound,

    #[error("storage failure")]
    StorageFailure(#[source] anyhow::Error),
}

/// Request-level error that maps to an HTTP response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    /// Missing, unknown, expired or logged-out session.
    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("storage failure")]
    StorageFailure(#[source] anyhow::Error),
}

impl ApiError {
    /// Stable machine-readable kind reported to the caller.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(AuthError::InvalidInput) => "invalid_input",
            Self::Auth(AuthError::AlreadyExists) => "already_exists",
            // Both halves of a failed login look the same from outside.
            Self::Auth(AuthError::NotFound | AuthError::BadCredential) => "bad_credential",
            Self::Auth(AuthError::NoSession) => "no_session",
            Self::Chat(ChatError::Empty) => "empty",
            Self::Chat(ChatError::TooLong) => "too_long",
            Self::Chat(ChatError::NotFound) => "not_found",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Auth(AuthError::StorageFailure(_))
            | Self::Chat(ChatError::StorageFailure(_))
            | Self::StorageFailure(_) => "storage_failure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::InvalidInput) => StatusCode::BAD_REQUEST,
            Self::Auth(AuthError::AlreadyExists) => StatusCode::CONFLICT,
            Self::Auth(AuthError::NotFound | AuthError::BadCredential | AuthError::NoSession) => {
                StatusCode::FORBIDDEN
            }
            Self::Chat(ChatError::Empty | ChatError::TooLong) => StatusCode::BAD_REQUEST,
            Self::Chat(ChatError::NotFound) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Auth(AuthError::StorageFailure(_))
            | Self::Chat(ChatError::StorageFailure(_))
            | Self::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn storage_cause(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Auth(AuthError::StorageFailure(e))
            | Self::Chat(ChatError::StorageFailure(e))
            | Self::StorageFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // The cause stays in the server log; the caller only sees the kind.
        if let Some(cause) = self.storage_cause() {
            error!("storage failure: {:#}", cause);
        }

        let body = ErrorBody {
            error: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::StorageFailure(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_failures_are_indistinguishable() {
        let unknown = ApiError::from(AuthError::NotFound);
        let wrong = ApiError::from(AuthError::BadCredential);
        assert_eq!(unknown.status(), wrong.status());
        assert_eq!(unknown.code(), wrong.code());
        assert_eq!(unknown.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_storage_detail_not_in_message() {
        let err = ApiError::from(ChatError::StorageFailure(anyhow::anyhow!("disk I/O error at /var/db")));
        assert_eq!(err.to_string(), "storage failure");
        assert_eq!(err.code(), "storage_failure");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(AuthError::InvalidInput).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(AuthError::AlreadyExists).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(ChatError::TooLong).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ChatError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
    }
}
