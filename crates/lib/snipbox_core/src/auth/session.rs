// @zen-component: AUTH-SessionStore
//
//! Server-side admin sessions over an external key-value store.
//!
//! Sessions are write-once: created on login, read on every cookie-bearing
//! request, deleted on logout or TTL expiry. Unknown and expired ids look
//! exactly the same to callers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::auth::SessionRecord;

/// Session lifetime: 270 days.
pub const SESSION_TTL: Duration = Duration::from_secs(270 * 24 * 60 * 60);

/// Key prefix for session entries in the shared store.
const SESSION_KEY_PREFIX: &str = "session:";

/// Session storage errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal key-value interface the session store needs.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError>;

    /// Fetch a live value. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Remove `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), SessionError>;
}

// =============================================================================
// In-memory backend
// =============================================================================

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// Process-local store, used in development and tests.
pub struct MemoryKeyValueStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                store.cleanup();
            }
        })
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError> {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// PostgreSQL backend
// =============================================================================

/// Durable store backed by the `kv_store` table.
#[derive(Clone)]
pub struct PgKeyValueStore {
    pool: PgPool,
}

impl PgKeyValueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionError> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(270));
        let expires_at = Utc::now() + ttl;
        sqlx::query("DELETE FROM kv_store WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "INSERT INTO kv_store (key, value, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_store WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM kv_store WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Session store
// =============================================================================

/// Generate a 128-bit random session identifier (URL-safe base64).
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Store key for a session id. Ids are hashed so a store dump cannot be
/// replayed as cookies.
fn session_key(session_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    format!("{SESSION_KEY_PREFIX}{:x}", hasher.finalize())
}

/// Create/get/delete of [`SessionRecord`]s over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            ttl: SESSION_TTL,
        }
    }

    /// Session lifetime applied at write time.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Persist `record` under a fresh id and return the id.
    pub async fn create(&self, record: &SessionRecord) -> Result<String, SessionError> {
        let session_id = generate_session_id();
        let value = serde_json::to_string(record)?;
        self.backend
            .put(&session_key(&session_id), &value, self.ttl)
            .await?;
        debug!(origin_ip = %record.origin_ip, "session created");
        Ok(session_id)
    }

    /// Look up a session. Unknown, expired and unreadable records are `None`.
    pub async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        if session_id.is_empty() {
            return Ok(None);
        }
        let Some(raw) = self.backend.get(&session_key(session_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(error = %e, "discarding unreadable session record");
                Ok(None)
            }
        }
    }

    /// Remove a session.
    pub async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.backend.delete(&session_key(session_id)).await?;
        debug!("session deleted");
        Ok(())
    }
}
