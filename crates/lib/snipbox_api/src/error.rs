//! Application error types.
//!
//! Every core rejection keeps its machine-readable category on the way out:
//! the `error` field of the body is the category, `message` is prose, and
//! `details` carries whatever structured context the client can act on.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::json;
use snipbox_core::auth::csrf::CsrfRejection;
use snipbox_core::auth::{ACCEPTED_METHODS, AuthError, SessionError, TokenError};
use snipbox_core::components::RepositoryError;
use snipbox_core::error::ErrorCategory;
use snipbox_core::validation::ValidationErrors;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Csrf(#[from] CsrfRejection),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Reason category reported in the `error` field.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Auth(AuthError::Token(TokenError::Encoding(_))) => ErrorCategory::Internal,
            AppError::Auth(e) => e.category(),
            AppError::Csrf(e) => e.category(),
            AppError::Validation(e) => e.category(),
            AppError::Repository(e) => e.category(),
            AppError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCategory::ForbiddenCsrf => StatusCode::FORBIDDEN,
            ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCategory::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorCategory::Misconfigured => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Auth(AuthError::Unauthenticated | AuthError::InvalidCredential)
            | AppError::Auth(AuthError::Token(
                TokenError::Malformed
                | TokenError::BadSignature
                | TokenError::Expired
                | TokenError::WrongKind { .. },
            )) => Some(json!({ "acceptedMethods": ACCEPTED_METHODS })),
            AppError::Auth(AuthError::RateLimited { retry_after_secs }) => {
                Some(json!({ "retryAfter": retry_after_secs }))
            }
            AppError::Csrf(rejection) => serde_json::to_value(rejection).ok(),
            AppError::Validation(errors) => serde_json::to_value(&errors.errors)
                .ok()
                .map(|fields| json!({ "fields": fields })),
            _ => None,
        }
    }

    /// Client-facing message. Operator-side failures stay generic.
    fn message(&self) -> String {
        match self.category() {
            ErrorCategory::Internal => "Internal server error".to_string(),
            ErrorCategory::Misconfigured => "Service is not configured".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Misconfigured => {
                error!(category = %self.category(), error = %self, "request failed");
            }
            _ => {}
        }

        let body = Json(ErrorResponse {
            error: self.category().to_string(),
            message: self.message(),
            details: self.details(),
        });
        let mut response = (status, body).into_response();

        if let AppError::Auth(AuthError::RateLimited { retry_after_secs }) = &self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Auth(AuthError::Token(e))
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Auth(AuthError::Session(e))
    }
}
