// @zen-component: AUTH-AccessControl
//
//! Admin authentication middleware.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use snipbox_core::auth::gateway::resolve_client_id;
use snipbox_core::auth::{AuthRequest, Identity};

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies;

/// Key used to store the caller's [`Identity`] in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin(pub Identity);

/// The caller's client identifier, the key for rate limiting.
///
/// Resolved from the socket peer address (the server must be run with
/// `into_make_service_with_connect_info::<SocketAddr>()`), or from proxy
/// headers when `TRUST_PROXY_HEADERS` is set.
#[derive(Debug, Clone)]
pub struct ClientId(pub String);

impl FromRequestParts<AppState> for ClientId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        resolve_client_id(peer, &parts.headers, state.config.client_id_source())
            .map(Self)
            .ok_or_else(|| AppError::Internal("client address unavailable".into()))
    }
}

/// Axum middleware: runs the rate-limited auth gateway over the request's
/// headers and session cookie, and injects `AuthenticatedAdmin` on success.
pub async fn require_auth(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_request = AuthRequest::new(
        request.headers().clone(),
        cookies::session_id(request.headers()),
        client_id,
    );
    let identity = state
        .gateway
        .authenticate_rate_limited(&auth_request)
        .await?;

    request.extensions_mut().insert(AuthenticatedAdmin(identity));

    Ok(next.run(request).await)
}
