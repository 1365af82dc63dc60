//! Authentication and request-integrity logic.
//!
//! Token signing, session storage, rate limiting, CSRF scoring and the
//! gateway that combines them into one identity decision per request.

pub mod compare;
pub mod csrf;
pub mod gateway;
pub mod rate_limit;
pub mod session;
pub mod strategies;
pub mod token;

use thiserror::Error;

use crate::error::ErrorCategory;

pub use gateway::{AuthGateway, AuthMethod, AuthRequest, ClientIdSource, Identity};
pub use session::SessionError;
pub use token::TokenError;

/// Human-readable names of the accepted authentication methods, in the
/// order the gateway tries them.
pub const ACCEPTED_METHODS: [&str; 3] = [
    "Authorization: Bearer <access token>",
    "session cookie (after POST /api/auth/login)",
    "Authorization / X-Admin-Password shared secret",
];

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Too many authentication attempts, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Server misconfigured: {0}")]
    Misconfigured(String),

    #[error("Session store error: {0}")]
    Session(#[from] SessionError),
}

impl AuthError {
    /// Reason category for this failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthenticated | Self::InvalidCredential | Self::Token(_) => {
                ErrorCategory::Unauthenticated
            }
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::Misconfigured(_) | Self::Session(_) => ErrorCategory::Misconfigured,
        }
    }
}
