//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! types (which have `#[serde(rename_all = "camelCase")]` for the wire).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which half of a credential pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims embedded in every signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (standard JWT `sub` claim).
    pub sub: String,
    /// Access or refresh.
    pub kind: TokenKind,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Unique token id, so two tokens minted in the same second differ.
    pub jti: String,
}

/// A freshly minted access/refresh token pair.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Server-side session record, stored under an opaque random identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "originIP")]
    pub origin_ip: String,
}

impl SessionRecord {
    /// Admin session created now for the given client.
    pub fn admin(origin_ip: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            created_at: Utc::now(),
            origin_ip: origin_ip.into(),
        }
    }
}
