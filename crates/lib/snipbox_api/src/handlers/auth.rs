// @zen-component: AUTH-LoginEndpoint
// @zen-component: AUTH-TokenRefreshEndpoint
//
//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use snipbox_core::auth::AuthRequest;

use crate::AppState;
use crate::error::AppResult;
use crate::handlers::json_body;
use crate::middleware::auth::ClientId;
use crate::models::{
    AuthStatusResponse, LoginRequest, LogoutResponse, RefreshRequest, TokenResponse,
};
use crate::services::{auth, cookies};

/// `POST /api/auth/login`: admin password in, session cookie and token pair out.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let body = json_body(body)?;
    let outcome = auth::login(&state, &client_id, &body.password).await?;
    let cookie = cookies::session_cookie(&outcome.session_id, !state.config.dev_mode);
    Ok((jar.add(cookie), Json(outcome.tokens)))
}

/// `POST /api/auth/refresh`: exchange a refresh token for a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let body = json_body(body)?;
    Ok(Json(auth::refresh(&state, &body.refresh_token)?))
}

/// `POST /api/auth/logout`: delete the session and clear the cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<LogoutResponse>)> {
    let session_id = jar
        .get(cookies::SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|id| !id.is_empty());
    auth::logout(&state, session_id.as_deref()).await?;
    let jar = jar.add(cookies::clear_session_cookie(!state.config.dev_mode));
    Ok((jar, Json(LogoutResponse { success: true })))
}

/// `GET /api/auth/status`: whether the caller is currently authenticated.
pub async fn auth_status_handler(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    headers: HeaderMap,
) -> AppResult<Json<AuthStatusResponse>> {
    let session_id = cookies::session_id(&headers);
    let request = AuthRequest::new(headers, session_id, client_id);
    Ok(Json(auth::status(&state, &request).await?))
}
