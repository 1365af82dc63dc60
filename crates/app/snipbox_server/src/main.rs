//! Snipbox API server binary.
//!
//! Serves the component API with PostgreSQL-backed sessions and components
//! when a database URL is configured, and in-memory backends otherwise.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use snipbox_api::config::ApiConfig;
use snipbox_api::{AppState, StorageBackend};
use snipbox_core::auth::session::MemoryKeyValueStore;
use snipbox_core::components::MemoryComponentRepository;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

/// CLI arguments. Anything not given here falls back to `ApiConfig::from_env`.
#[derive(Parser, Debug)]
#[command(name = "snipbox_server", about = "Snipbox component API server")]
struct Args {
    /// Port to listen on; overrides the port in `BIND_ADDR`.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// PostgreSQL connection URL. Without one, state lives in memory.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Development mode: loopback origins, relaxed CSRF, non-secure cookies.
    #[arg(long, env = "SNIPBOX_DEV_MODE", default_value_t = false)]
    dev: bool,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,snipbox_api=debug,snipbox_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map_or("127.0.0.1", |(host, _)| host);
        config.bind_addr = format!("{host}:{port}");
    }
    if args.database_url.is_some() {
        config.database_url = args.database_url;
    }
    config.dev_mode |= args.dev;

    info!(
        bind_addr = %config.bind_addr,
        dev_mode = config.dev_mode,
        script_policy = %config.script_policy,
        trust_proxy_headers = config.trust_proxy_headers,
        "starting snipbox_server"
    );
    if config.admin_password.is_none() {
        warn!("ADMIN_PASSWORD is not set; admin endpoints will report misconfigured");
    }

    let state = match config.database_url.clone() {
        Some(database_url) => {
            info!(max_connections = args.max_connections, "configuring connection pool");
            let pool = PgPoolOptions::new()
                .max_connections(args.max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&database_url)
                .await?;

            info!("running database migrations");
            snipbox_api::migrate(&pool).await?;

            AppState::postgres(config, pool)
        }
        None => {
            warn!("DATABASE_URL not set; sessions and components are kept in memory");
            let sessions = Arc::new(MemoryKeyValueStore::new());
            sessions.spawn_cleanup_task();
            AppState::new(
                config,
                StorageBackend::Memory,
                sessions,
                Arc::new(MemoryComponentRepository::new()),
            )
        }
    };
    state.gateway.limiter().spawn_cleanup_task();

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, storage = %state.storage, "REST API listening");

    let app = snipbox_api::router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
        })
        .await?;

    Ok(())
}
