//! The three built-in authentication strategies, in gateway order.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::AUTHORIZATION;

use super::AuthError;
use super::compare::constant_time_str_eq;
use super::csrf::bearer_token;
use super::gateway::{Attempt, AuthMethod, AuthRequest, AuthStrategy, Identity};
use super::session::SessionStore;
use super::token::TokenCodec;
use crate::models::auth::TokenKind;

/// Subject reported for session and shared-secret logins.
pub const ADMIN_SUBJECT: &str = "admin";

/// Legacy header carrying the admin password.
pub const LEGACY_PASSWORD_HEADER: &str = "x-admin-password";

fn authorization(request: &AuthRequest) -> Option<&str> {
    request
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `Authorization: Bearer <access token>`.
pub struct BearerTokenStrategy {
    codec: Arc<TokenCodec>,
}

impl BearerTokenStrategy {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl AuthStrategy for BearerTokenStrategy {
    async fn attempt(&self, request: &AuthRequest) -> Result<Attempt, AuthError> {
        let Some(token) = authorization(request).and_then(bearer_token) else {
            return Ok(Attempt::Skip("no bearer token"));
        };
        match self.codec.verify_kind(token, TokenKind::Access) {
            Ok(claims) => Ok(Attempt::Matched(Identity {
                subject: claims.sub,
                method: AuthMethod::BearerToken,
            })),
            // Not a valid access token; the value may still be the shared secret.
            Err(_) => Ok(Attempt::Skip("bearer token rejected")),
        }
    }

    fn name(&self) -> &str {
        "BearerToken"
    }
}

/// Session id from the session cookie, looked up in the session store.
pub struct SessionCookieStrategy {
    sessions: SessionStore,
}

impl SessionCookieStrategy {
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl AuthStrategy for SessionCookieStrategy {
    async fn attempt(&self, request: &AuthRequest) -> Result<Attempt, AuthError> {
        let Some(session_id) = request.session_id.as_deref() else {
            return Ok(Attempt::Skip("no session cookie"));
        };
        match self.sessions.get(session_id).await? {
            Some(record) if record.is_admin => Ok(Attempt::Matched(Identity {
                subject: ADMIN_SUBJECT.to_string(),
                method: AuthMethod::SessionCookie,
            })),
            Some(_) => Ok(Attempt::Skip("session is not admin")),
            None => Ok(Attempt::Skip("unknown or expired session")),
        }
    }

    fn name(&self) -> &str {
        "SessionCookie"
    }
}

/// Legacy shared secret: the admin password sent as a bearer value, a raw
/// `Authorization` value, or in `X-Admin-Password`.
pub struct SharedSecretStrategy {
    secret: String,
}

impl SharedSecretStrategy {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl AuthStrategy for SharedSecretStrategy {
    async fn attempt(&self, request: &AuthRequest) -> Result<Attempt, AuthError> {
        let from_authorization =
            authorization(request).map(|value| bearer_token(value).unwrap_or(value));
        let from_legacy = request
            .headers
            .get(LEGACY_PASSWORD_HEADER)
            .and_then(|v| v.to_str().ok());

        let candidates = [from_authorization, from_legacy];
        if candidates.iter().all(Option::is_none) {
            return Ok(Attempt::Skip("no shared secret presented"));
        }

        // Compare every presented candidate so timing does not reveal which
        // header carried the match.
        let matched = candidates
            .iter()
            .flatten()
            .fold(false, |acc, candidate| {
                acc | constant_time_str_eq(candidate, &self.secret)
            });

        if matched {
            Ok(Attempt::Matched(Identity {
                subject: ADMIN_SUBJECT.to_string(),
                method: AuthMethod::SharedSecret,
            }))
        } else {
            Ok(Attempt::Skip("shared secret mismatch"))
        }
    }

    fn name(&self) -> &str {
        "SharedSecret"
    }
}
