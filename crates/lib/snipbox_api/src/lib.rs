//! # snipbox_api
//!
//! HTTP API library for Snipbox.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post, put};
use snipbox_core::auth::AuthGateway;
use snipbox_core::auth::csrf::{APP_HEADER, CsrfGuard};
use snipbox_core::auth::rate_limit::RateLimiter;
use snipbox_core::auth::session::{
    KeyValueStore, MemoryKeyValueStore, PgKeyValueStore, SessionStore,
};
use snipbox_core::auth::strategies::LEGACY_PASSWORD_HEADER;
use snipbox_core::auth::token::TokenCodec;
use snipbox_core::components::{
    ComponentRepository, MemoryComponentRepository, PgComponentRepository,
};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{auth, components, health};

/// Which backends hold sessions and components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    pub storage: StorageBackend,
    pub codec: Arc<TokenCodec>,
    pub sessions: SessionStore,
    pub gateway: Arc<AuthGateway>,
    pub csrf: Arc<CsrfGuard>,
    pub components: Arc<dyn ComponentRepository>,
}

impl AppState {
    /// Wire the auth stack over the given backends.
    pub fn new(
        config: ApiConfig,
        storage: StorageBackend,
        session_backend: Arc<dyn KeyValueStore>,
        components: Arc<dyn ComponentRepository>,
    ) -> Self {
        let codec = Arc::new(TokenCodec::new(
            config.jwt_secret.as_bytes(),
            &config.access_ttl,
            &config.refresh_ttl,
        ));
        let sessions = SessionStore::new(session_backend);
        let gateway = Arc::new(AuthGateway::new(
            Arc::clone(&codec),
            sessions.clone(),
            config.admin_password.clone(),
            Arc::new(RateLimiter::default()),
        ));
        let csrf = Arc::new(CsrfGuard::new(&config.csrf()));
        Self {
            config,
            storage,
            codec,
            sessions,
            gateway,
            csrf,
            components,
        }
    }

    /// Process-local backends; state is lost on restart.
    pub fn in_memory(config: ApiConfig) -> Self {
        Self::new(
            config,
            StorageBackend::Memory,
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(MemoryComponentRepository::new()),
        )
    }

    /// Sessions and components in PostgreSQL. Run [`migrate`] first.
    pub fn postgres(config: ApiConfig, pool: PgPool) -> Self {
        Self::new(
            config,
            StorageBackend::Postgres,
            Arc::new(PgKeyValueStore::new(pool.clone())),
            Arc::new(PgComponentRepository::new(pool)),
        )
    }
}

/// Run embedded database migrations.
///
/// Delegates to `snipbox_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    snipbox_core::migrate::migrate(pool).await
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .csrf
        .allowed_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static(APP_HEADER),
            HeaderName::from_static(LEGACY_PASSWORD_HEADER),
        ])
        .allow_credentials(true)
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/refresh", post(auth::refresh_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/auth/status", get(auth::auth_status_handler))
        .route(
            "/api/components",
            get(components::list_components_handler)
                .post(components::create_component_handler),
        )
        .route(
            "/api/components/{id}",
            get(components::get_component_handler),
        );

    // Admin routes (require auth)
    let admin = Router::new()
        .route(
            "/api/components/{id}",
            put(components::update_component_handler)
                .delete(components::delete_component_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::csrf::require_csrf_protection,
        ))
        .layer(cors)
        .with_state(state)
}
