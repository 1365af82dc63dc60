// @zen-component: DB-ComponentRepository
//
//! Component persistence seam.
//!
//! Handlers only see [`ComponentRepository`]; the server picks the Postgres
//! implementation when a database is configured and the in-memory one
//! otherwise.

mod memory;
mod pg;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ErrorCategory;
use crate::models::component::{Component, ComponentDraft, ComponentPatch};

pub use memory::MemoryComponentRepository;
pub use pg::PgComponentRepository;

/// Component storage errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Component not found: {0}")]
    NotFound(Uuid),
}

impl RepositoryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Db(_) => ErrorCategory::Internal,
            Self::NotFound(_) => ErrorCategory::NotFound,
        }
    }
}

/// CRUD over live (not soft-deleted) components.
#[async_trait]
pub trait ComponentRepository: Send + Sync {
    /// Live components, newest first, optionally restricted to a category.
    async fn list(&self, category: Option<&str>) -> Result<Vec<Component>, RepositoryError>;

    /// A live component by id.
    async fn get(&self, id: Uuid) -> Result<Component, RepositoryError>;

    /// Persist a new component.
    async fn create(&self, draft: ComponentDraft) -> Result<Component, RepositoryError>;

    /// Apply a patch to a live component.
    async fn update(&self, id: Uuid, patch: ComponentPatch) -> Result<Component, RepositoryError>;

    /// Mark a live component deleted.
    async fn soft_delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}
