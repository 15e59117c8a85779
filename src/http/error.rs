//! Mapping of domain errors to HTTP responses.
//!
//! Every error body is `{"message": "..."}`. Server-side failures are logged
//! with their detail and answered with a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::accounts::AccountError;
use crate::auth::AuthError;
use crate::content::ContentError;
use crate::share::ShareError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// An error ready to be sent to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn internal(err: &impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Internal(detail) => {
                error!(%detail, "Request failed");
                INTERNAL_MESSAGE.to_string()
            }
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message) => message,
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => Self::Unauthorized("Authentication token missing".to_string()),
            AuthError::InvalidToken(_) => Self::Unauthorized("Invalid or expired token".to_string()),
            AuthError::Issue(_) | AuthError::Hashing(_) => Self::internal(&err),
        }
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(_) => Self::NotFound("Content not found".to_string()),
            ContentError::Invalid { .. } => Self::BadRequest(err.to_string()),
            ContentError::Labels(_) | ContentError::Database { .. } => Self::internal(&err),
        }
    }
}

impl From<ShareError> for ApiError {
    fn from(err: ShareError) -> Self {
        match err {
            ShareError::Content(inner) => inner.into(),
            ShareError::Database { .. } | ShareError::Exhausted(_) => Self::internal(&err),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(_)
            | AccountError::UsernameTaken
            | AccountError::EmailTaken
            | AccountError::InvalidOtp
            | AccountError::OtpExpired => Self::BadRequest(err.to_string()),
            AccountError::InvalidCredentials => Self::Forbidden(err.to_string()),
            AccountError::Auth(inner) => inner.into(),
            AccountError::Cache(_) | AccountError::Mail(_) | AccountError::Database { .. } => {
                Self::internal(&err)
            }
        }
    }
}
