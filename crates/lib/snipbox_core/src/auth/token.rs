// @zen-component: AUTH-TokenCodec
//
//! Signed bearer tokens (HS256 JWT) and the access/refresh pair lifecycle.
//!
//! Tokens are stateless: validity is the signature plus the embedded expiry.
//! Rotation on refresh mints a fresh pair; the old refresh token stays valid
//! until its own expiry.

use std::path::{Path, PathBuf};

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::auth::{CredentialPair, TokenClaims, TokenKind};

/// Fallback lifetime for unparseable duration strings: 1 hour.
const DEFAULT_TTL_SECS: i64 = 60 * 60;

/// Default access token lifetime.
pub const DEFAULT_ACCESS_TTL: &str = "1h";

/// Default refresh token lifetime.
pub const DEFAULT_REFRESH_TTL: &str = "30d";

/// Token verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("bad token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("wrong token kind: expected {expected:?}")]
    WrongKind { expected: TokenKind },

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Parse a duration string like `"15m"`, `"1h"` or `"30d"` into seconds.
///
/// Supported suffixes are `s`, `m`, `h` and `d`. Anything else (including a
/// bare number or an unparseable amount) yields one hour.
pub fn parse_duration_secs(value: &str) -> i64 {
    let value = value.trim();
    let Some(unit) = value.chars().last() else {
        return DEFAULT_TTL_SECS;
    };
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return DEFAULT_TTL_SECS,
    };
    match value[..value.len() - unit.len_utf8()].parse::<i64>() {
        Ok(amount) if amount > 0 => amount * multiplier,
        _ => DEFAULT_TTL_SECS,
    }
}

/// Issues and verifies HS256 tokens with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from a secret and the two lifetime strings.
    pub fn new(secret: &[u8], access_ttl: &str, refresh_ttl: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl_secs: parse_duration_secs(access_ttl),
            refresh_ttl_secs: parse_duration_secs(refresh_ttl),
        }
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Refresh token lifetime in seconds.
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    /// Mint a new access/refresh pair for `subject`.
    pub fn issue(&self, subject: &str) -> Result<CredentialPair, TokenError> {
        let access_token = self.sign(&self.claims(subject, TokenKind::Access))?;
        let refresh_token = self.sign(&self.claims(subject, TokenKind::Refresh))?;
        debug!(subject, "issued credential pair");
        Ok(CredentialPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl_secs,
        })
    }

    /// Sign arbitrary claims.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(format!("jwt encode: {e}")))
    }

    /// Verify signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::Malformed);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }

    /// Verify a token and require it to be of `kind`.
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let claims = self.verify(token)?;
        if claims.kind != kind {
            return Err(TokenError::WrongKind { expected: kind });
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a brand new pair.
    pub fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, TokenError> {
        let claims = self.verify_kind(refresh_token, TokenKind::Refresh)?;
        self.issue(&claims.sub)
    }

    fn claims(&self, subject: &str, kind: TokenKind) -> TokenClaims {
        let now = Utc::now().timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        TokenClaims {
            sub: subject.to_string(),
            kind,
            iat: now,
            exp: now + ttl,
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// Resolve the signing secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    load_or_generate_secret(&jwt_secret_path())
}

/// Read the secret persisted at `path`, generating and writing one if absent.
pub fn load_or_generate_secret(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, &secret);
    info!(path = %path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snipbox")
        .join("jwt-secret")
}
