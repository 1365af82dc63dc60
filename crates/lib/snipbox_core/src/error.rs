//! Machine-readable rejection categories shared by every core error type.
//!
//! Callers at the HTTP boundary key status codes and client-facing `error`
//! fields off these, independent of the human-readable message text.

use std::fmt;

use serde::Serialize;

/// Reason category carried by every rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No valid credential was presented.
    Unauthenticated,
    /// CSRF heuristics scored the request below threshold.
    ForbiddenCsrf,
    /// Too many authentication attempts from this client.
    RateLimited,
    /// The payload failed schema or constraint checks.
    ValidationFailed,
    /// Operator error: secret or backing store missing.
    Misconfigured,
    /// Requested record does not exist.
    NotFound,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::ForbiddenCsrf => "forbidden_csrf",
            Self::RateLimited => "rate_limited",
            Self::ValidationFailed => "validation_failed",
            Self::Misconfigured => "misconfigured",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::ForbiddenCsrf).unwrap();
        assert_eq!(json, "\"forbidden_csrf\"");
        assert_eq!(ErrorCategory::RateLimited.to_string(), "rate_limited");
    }
}
