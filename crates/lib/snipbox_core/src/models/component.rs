//! Component domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category assigned when a create payload omits one.
pub const DEFAULT_CATEGORY: &str = "Other";

/// A stored UI component (HTML/CSS/JS snippet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Component {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub html: String,
    pub css: String,
    pub js: String,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated, sanitized content for a new component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDraft {
    pub name: String,
    pub category: String,
    pub html: String,
    pub css: String,
    pub js: String,
    pub tags: Vec<String>,
    pub author: Option<String>,
}

/// Validated, sanitized partial update. At least one field is `Some`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub html: Option<String>,
    pub css: Option<String>,
    pub js: Option<String>,
    pub tags: Option<Vec<String>>,
    pub author: Option<String>,
}

impl ComponentPatch {
    /// Apply the present fields onto an existing component.
    pub fn apply_to(&self, component: &mut Component) {
        if let Some(name) = &self.name {
            component.name = name.clone();
        }
        if let Some(category) = &self.category {
            component.category = category.clone();
        }
        if let Some(html) = &self.html {
            component.html = html.clone();
        }
        if let Some(css) = &self.css {
            component.css = css.clone();
        }
        if let Some(js) = &self.js {
            component.js = js.clone();
        }
        if let Some(tags) = &self.tags {
            component.tags = tags.clone();
        }
        if let Some(author) = &self.author {
            component.author = Some(author.clone());
        }
    }
}
