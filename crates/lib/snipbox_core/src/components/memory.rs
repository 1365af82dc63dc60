//! Process-local component store for development and tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{ComponentRepository, RepositoryError};
use crate::models::component::{Component, ComponentDraft, ComponentPatch};
use crate::uuid::uuidv7;

#[derive(Default)]
pub struct MemoryComponentRepository {
    rows: DashMap<Uuid, Component>,
}

impl MemoryComponentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ComponentRepository for MemoryComponentRepository {
    async fn list(&self, category: Option<&str>) -> Result<Vec<Component>, RepositoryError> {
        let mut live: Vec<Component> = self
            .rows
            .iter()
            .filter(|row| !row.is_deleted)
            .filter(|row| category.is_none_or(|c| row.category == c))
            .map(|row| row.value().clone())
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(live)
    }

    async fn get(&self, id: Uuid) -> Result<Component, RepositoryError> {
        self.rows
            .get(&id)
            .filter(|row| !row.is_deleted)
            .map(|row| row.value().clone())
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn create(&self, draft: ComponentDraft) -> Result<Component, RepositoryError> {
        let now = Utc::now();
        let component = Component {
            id: uuidv7(),
            name: draft.name,
            category: draft.category,
            html: draft.html,
            css: draft.css,
            js: draft.js,
            tags: draft.tags,
            author: draft.author,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.rows.insert(component.id, component.clone());
        Ok(component)
    }

    async fn update(&self, id: Uuid, patch: ComponentPatch) -> Result<Component, RepositoryError> {
        let mut row = self
            .rows
            .get_mut(&id)
            .filter(|row| !row.is_deleted)
            .ok_or(RepositoryError::NotFound(id))?;
        patch.apply_to(&mut row);
        row.updated_at = Utc::now();
        Ok(row.value().clone())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut row = self
            .rows
            .get_mut(&id)
            .filter(|row| !row.is_deleted)
            .ok_or(RepositoryError::NotFound(id))?;
        row.is_deleted = true;
        row.updated_at = Utc::now();
        Ok(())
    }
}
