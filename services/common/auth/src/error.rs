use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("failed to sign token: {0}")]
    TokenGeneration(String),
    #[error("missing Authorization header")]
    MissingToken,
    #[error("{0}")]
    Unauthorized(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential(_) => "INVALID_CREDENTIAL",
            AuthError::TokenGeneration(_) => "TOKEN_GENERATION_FAILED",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::Unauthorized(_) => "UNAUTHORIZED",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidCredential(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::TokenGeneration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::InvalidCredential(_)
            | AuthError::MissingToken
            | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        };

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
