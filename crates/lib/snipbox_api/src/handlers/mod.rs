//! Request handlers.

pub mod auth;
pub mod components;
pub mod health;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use snipbox_core::validation::{BODY_FIELD, ValidationErrors};

use crate::error::{AppError, AppResult};

/// Unwrap a JSON body, reporting malformed payloads as a `body` field error.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(value)| value).map_err(|rejection| {
        AppError::from(ValidationErrors::single(BODY_FIELD, rejection.body_text()))
    })
}
