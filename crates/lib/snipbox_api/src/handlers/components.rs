// @zen-component: API-ComponentsHandler
//
//! Component CRUD handlers. Reads and creates are public; updates and
//! deletes sit behind `require_auth`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use snipbox_core::validation::{
    parse_create, parse_update, validate_and_sanitize_create, validate_and_sanitize_update,
};
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::handlers::json_body;
use crate::middleware::auth::AuthenticatedAdmin;
use crate::models::{
    ComponentListResponse, ComponentResponse, DeleteComponentResponse, ListComponentsQuery,
};

/// `GET /api/components`: live components, newest first.
pub async fn list_components_handler(
    State(state): State<AppState>,
    Query(query): Query<ListComponentsQuery>,
) -> AppResult<Json<ComponentListResponse>> {
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    let items: Vec<ComponentResponse> = state
        .components
        .list(category)
        .await?
        .into_iter()
        .map(ComponentResponse::from)
        .collect();
    Ok(Json(ComponentListResponse {
        total: items.len(),
        items,
    }))
}

/// `GET /api/components/{id}`
pub async fn get_component_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ComponentResponse>> {
    Ok(Json(state.components.get(id).await?.into()))
}

/// `POST /api/components`: validate, sanitize, store.
pub async fn create_component_handler(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ComponentResponse>)> {
    let request = parse_create(json_body(body)?)?;
    let draft = validate_and_sanitize_create(request, state.config.script_policy)?;
    let component = state.components.create(draft).await?;
    info!(id = %component.id, category = %component.category, "component created");
    Ok((StatusCode::CREATED, Json(component.into())))
}

/// `PUT /api/components/{id}`: admin only.
pub async fn update_component_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedAdmin>,
    Path(id): Path<Uuid>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<Json<ComponentResponse>> {
    let request = parse_update(json_body(body)?)?;
    let patch = validate_and_sanitize_update(request, state.config.script_policy)?;
    let component = state.components.update(id, patch).await?;
    info!(%id, method = ?admin.0.method, "component updated");
    Ok(Json(component.into()))
}

/// `DELETE /api/components/{id}`: admin only; soft delete.
pub async fn delete_component_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedAdmin>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteComponentResponse>> {
    state.components.soft_delete(id).await?;
    info!(%id, method = ?admin.0.method, "component deleted");
    Ok(Json(DeleteComponentResponse { success: true, id }))
}
