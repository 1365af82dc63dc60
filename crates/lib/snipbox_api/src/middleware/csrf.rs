// @zen-component: AUTH-CsrfProtection
//
//! CSRF middleware. Read-only methods pass untouched; mutating requests must
//! score enough origin/header/bearer signals.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;

pub async fn require_csrf_protection(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    state.csrf.check(request.method(), request.headers())?;
    Ok(next.run(request).await)
}
