use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::AuthError;
use serde::Serialize;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure kinds surfaced by the auth core. Messages carry the calling
/// operation's context; the variant decides the wire status.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    UserNotFound(String),
    #[error("{0}")]
    IncorrectPassword(String),
    #[error("{0}")]
    UserAlreadyExists(String),
    #[error("{0}")]
    TokenGenerationFailed(String),
    #[error("{0}")]
    InvalidRefreshToken(String),
    #[error("{0}")]
    MissingToken(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    UpdateFailed(String),
    #[error("{0}")]
    SaveFailed(String),
    #[error("{0}")]
    DeleteFailed(String),
    #[error("{0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            ServiceError::UserNotFound(_) => "USER_NOT_FOUND",
            ServiceError::IncorrectPassword(_) => "INCORRECT_PASSWORD",
            ServiceError::UserAlreadyExists(_) => "USER_ALREADY_EXISTS",
            ServiceError::TokenGenerationFailed(_) => "TOKEN_GENERATION_FAILED",
            ServiceError::InvalidRefreshToken(_) => "INVALID_REFRESH_TOKEN",
            ServiceError::MissingToken(_) => "MISSING_TOKEN",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::UpdateFailed(_) => "UPDATE_USER_FAILED",
            ServiceError::SaveFailed(_) => "SAVE_USER_FAILED",
            ServiceError::DeleteFailed(_) => "DELETE_USER_FAILED",
            ServiceError::Unavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidCredentials(_) => StatusCode::BAD_REQUEST,
            ServiceError::UserNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::IncorrectPassword(_)
            | ServiceError::InvalidRefreshToken(_)
            | ServiceError::MissingToken(_)
            | ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::UserAlreadyExists(_) => StatusCode::CONFLICT,
            ServiceError::TokenGenerationFailed(_)
            | ServiceError::UpdateFailed(_)
            | ServiceError::SaveFailed(_)
            | ServiceError::DeleteFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::TokenGeneration(message) => ServiceError::TokenGenerationFailed(message),
            AuthError::MissingToken => ServiceError::MissingToken(value.to_string()),
            AuthError::InvalidCredential(_) | AuthError::Unauthorized(_) => {
                ServiceError::Unauthorized(value.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
