//! PostgreSQL component store over the `components` table.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ComponentRepository, RepositoryError};
use crate::models::component::{Component, ComponentDraft, ComponentPatch};
use crate::uuid::uuidv7;

#[derive(Clone)]
pub struct PgComponentRepository {
    pool: PgPool,
}

impl PgComponentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ComponentRepository for PgComponentRepository {
    async fn list(&self, category: Option<&str>) -> Result<Vec<Component>, RepositoryError> {
        let rows = sqlx::query_as::<_, Component>(
            r#"
            SELECT id, name, category, html, css, js, tags, author, is_deleted, created_at, updated_at
            FROM components
            WHERE NOT is_deleted AND ($1::text IS NULL OR category = $1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Component, RepositoryError> {
        sqlx::query_as::<_, Component>(
            r#"
            SELECT id, name, category, html, css, js, tags, author, is_deleted, created_at, updated_at
            FROM components
            WHERE id = $1 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound(id))
    }

    async fn create(&self, draft: ComponentDraft) -> Result<Component, RepositoryError> {
        let row = sqlx::query_as::<_, Component>(
            r#"
            INSERT INTO components (id, name, category, html, css, js, tags, author)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, category, html, css, js, tags, author, is_deleted, created_at, updated_at
            "#,
        )
        .bind(uuidv7())
        .bind(&draft.name)
        .bind(&draft.category)
        .bind(&draft.html)
        .bind(&draft.css)
        .bind(&draft.js)
        .bind(&draft.tags)
        .bind(&draft.author)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, patch: ComponentPatch) -> Result<Component, RepositoryError> {
        sqlx::query_as::<_, Component>(
            r#"
            UPDATE components
            SET name = COALESCE($2, name),
                category = COALESCE($3, category),
                html = COALESCE($4, html),
                css = COALESCE($5, css),
                js = COALESCE($6, js),
                tags = COALESCE($7, tags),
                author = COALESCE($8, author),
                updated_at = now()
            WHERE id = $1 AND NOT is_deleted
            RETURNING id, name, category, html, css, js, tags, author, is_deleted, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.category)
        .bind(&patch.html)
        .bind(&patch.css)
        .bind(&patch.js)
        .bind(&patch.tags)
        .bind(&patch.author)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound(id))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE components SET is_deleted = TRUE, updated_at = now() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }
}
