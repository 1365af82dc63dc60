//! Database migration support.
//!
//! Embeds and runs SQL migrations from `snipbox_core/migrations/`: the
//! `components` table and the `kv_store` table behind admin sessions.

use sqlx::PgPool;
use tracing::info;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = sqlx::migrate!("./migrations");
    info!(count = migrator.iter().count(), "applying database migrations");
    migrator.run(pool).await
}
