//! Wire types for the HTTP API.
//!
//! Request and response bodies use camelCase; domain types from
//! `snipbox_core` are converted at the handler boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snipbox_core::auth::AuthMethod;
use snipbox_core::models::auth::CredentialPair;
use snipbox_core::models::component::Component;
use uuid::Uuid;

/// `tokenType` reported alongside every issued pair.
pub const TOKEN_TYPE: &str = "Bearer";

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable reason category.
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Access/refresh pair as returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<CredentialPair> for TokenResponse {
    fn from(pair: CredentialPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            token_type: TOKEN_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<AuthMethod>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListComponentsQuery {
    pub category: Option<String>,
}

/// A stored component on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentResponse {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub html: String,
    pub css: String,
    pub js: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Component> for ComponentResponse {
    fn from(c: Component) -> Self {
        Self {
            id: c.id,
            name: c.name,
            category: c.category,
            html: c.html,
            css: c.css,
            js: c.js,
            tags: c.tags,
            author: c.author,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentListResponse {
    pub items: Vec<ComponentResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteComponentResponse {
    pub success: bool,
    pub id: Uuid,
}
