// @zen-component: AUTH-CredentialService
// @zen-component: AUTH-TokenService
//
//! Authentication flows: login, refresh, logout and status, delegating to
//! `snipbox_core::auth`.

use snipbox_core::auth::compare::constant_time_str_eq;
use snipbox_core::auth::strategies::ADMIN_SUBJECT;
use snipbox_core::auth::{AuthError, AuthRequest};
use snipbox_core::error::ErrorCategory;
use snipbox_core::models::auth::SessionRecord;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::AppResult;
use crate::models::{AuthStatusResponse, TokenResponse};

/// A successful login: the new session id plus a fresh token pair.
#[derive(Debug)]
pub struct LoginOutcome {
    pub session_id: String,
    pub tokens: TokenResponse,
}

/// Check the admin password and open a session.
///
/// Every attempt counts against the client's rate limit; a success clears it.
pub async fn login(state: &AppState, client_id: &str, password: &str) -> AppResult<LoginOutcome> {
    let Some(expected) = state.config.admin_password.as_deref() else {
        return Err(AuthError::Misconfigured("ADMIN_PASSWORD is not set".into()).into());
    };

    let limiter = state.gateway.limiter();
    if limiter.is_blocked(client_id) {
        let retry_after_secs = limiter.retry_after_secs(client_id);
        warn!(client_id, retry_after_secs, "login rate limited");
        return Err(AuthError::RateLimited { retry_after_secs }.into());
    }

    if password.is_empty() || !constant_time_str_eq(password, expected) {
        warn!(client_id, "login rejected: wrong password");
        return Err(AuthError::InvalidCredential.into());
    }

    let session_id = state.sessions.create(&SessionRecord::admin(client_id)).await?;
    let tokens = state.codec.issue(ADMIN_SUBJECT)?;
    limiter.reset(client_id);

    info!(client_id, "admin logged in");
    Ok(LoginOutcome {
        session_id,
        tokens: tokens.into(),
    })
}

/// Exchange a refresh token for a new pair.
pub fn refresh(state: &AppState, refresh_token: &str) -> AppResult<TokenResponse> {
    let pair = state.codec.refresh(refresh_token)?;
    debug!("token pair refreshed");
    Ok(pair.into())
}

/// Forget the session, if one was presented.
pub async fn logout(state: &AppState, session_id: Option<&str>) -> AppResult<()> {
    if let Some(session_id) = session_id {
        state.sessions.delete(session_id).await?;
        info!("admin session closed");
    }
    Ok(())
}

/// Report whether the request is authenticated without counting it as an
/// attempt. Operator-side failures still surface as errors.
pub async fn status(state: &AppState, request: &AuthRequest) -> AppResult<AuthStatusResponse> {
    match state.gateway.authenticate(request).await {
        Ok(identity) => Ok(AuthStatusResponse {
            authenticated: true,
            method: Some(identity.method),
        }),
        Err(e) if e.category() == ErrorCategory::Misconfigured => Err(e.into()),
        Err(_) => Ok(AuthStatusResponse {
            authenticated: false,
            method: None,
        }),
    }
}
