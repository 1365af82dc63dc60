// @zen-component: VAL-RequestValidator
//
//! Schema checks and sanitization for component write payloads.
//!
//! Create payloads require a name; update payloads are all-optional but must
//! carry at least one field. Failures are reported per field so clients can
//! highlight the offending input.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorCategory;
use crate::models::component::{ComponentDraft, ComponentPatch, DEFAULT_CATEGORY};
use crate::sanitize::{ScriptPolicy, sanitize_content, sanitize_plain_text};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_CATEGORY_LEN: usize = 50;
pub const MAX_CONTENT_LEN: usize = 50_000;
pub const MAX_AUTHOR_LEN: usize = 100;

/// Field name used for errors about the payload as a whole.
pub const BODY_FIELD: &str = "body";

/// Tags as a comma-separated string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Csv(String),
}

impl TagsInput {
    /// Plain-text tags in input order, blanks removed.
    pub fn into_tags(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            Self::List(list) => list,
            Self::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };
        raw.iter()
            .map(|tag| sanitize_plain_text(tag))
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Inbound create payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComponentRequest {
    #[serde(default)]
    pub name: String,
    pub category: Option<String>,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
    pub tags: Option<TagsInput>,
    pub author: Option<String>,
}

/// Inbound update payload. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComponentRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub html: Option<String>,
    pub css: Option<String>,
    pub js: Option<String>,
    pub tags: Option<TagsInput>,
    pub author: Option<String>,
}

impl UpdateComponentRequest {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.html.is_none()
            && self.css.is_none()
            && self.js.is_none()
            && self.tags.is_none()
            && self.author.is_none()
    }
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field errors found in one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("validation failed for {} field(s)", .errors.len())]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// A single error about `field`.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::ValidationFailed
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.field.as_str())
    }
}

/// Accumulates field errors across all checks.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(field, format!("must be at most {max} characters"));
        }
    }

    fn non_empty(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "is required");
        }
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value())
        } else {
            debug!(fields = ?self.errors.iter().map(|e| &e.field).collect::<Vec<_>>(), "payload rejected");
            Err(ValidationErrors {
                errors: self.errors,
            })
        }
    }
}

/// Deserialize a create payload, reporting shape errors as a body error.
pub fn parse_create(value: serde_json::Value) -> Result<CreateComponentRequest, ValidationErrors> {
    serde_json::from_value(value).map_err(|e| ValidationErrors::single(BODY_FIELD, e.to_string()))
}

/// Deserialize an update payload, reporting shape errors as a body error.
pub fn parse_update(value: serde_json::Value) -> Result<UpdateComponentRequest, ValidationErrors> {
    serde_json::from_value(value).map_err(|e| ValidationErrors::single(BODY_FIELD, e.to_string()))
}

fn plain_or(value: Option<&str>, fallback: &str) -> String {
    let cleaned = value.map(sanitize_plain_text).unwrap_or_default();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

fn optional_plain(value: Option<&str>) -> Option<String> {
    value
        .map(sanitize_plain_text)
        .filter(|cleaned| !cleaned.is_empty())
}

/// Validate a create payload and sanitize its content.
pub fn validate_and_sanitize_create(
    request: CreateComponentRequest,
    policy: ScriptPolicy,
) -> Result<ComponentDraft, ValidationErrors> {
    let mut check = Checker::default();
    check.non_empty("name", &request.name);
    check.max_len("name", &request.name, MAX_NAME_LEN);
    if let Some(category) = &request.category {
        check.max_len("category", category, MAX_CATEGORY_LEN);
    }
    check.max_len("html", &request.html, MAX_CONTENT_LEN);
    check.max_len("css", &request.css, MAX_CONTENT_LEN);
    check.max_len("js", &request.js, MAX_CONTENT_LEN);
    if let Some(author) = &request.author {
        check.max_len("author", author, MAX_AUTHOR_LEN);
    }

    let name = sanitize_plain_text(&request.name);
    if name.is_empty() && !request.name.trim().is_empty() {
        check.push("name", "must contain displayable text");
    }

    check.finish(|| {
        let content = sanitize_content(&request.html, &request.css, &request.js, policy);
        ComponentDraft {
            name,
            category: plain_or(request.category.as_deref(), DEFAULT_CATEGORY),
            html: content.html,
            css: content.css,
            js: content.js,
            tags: request.tags.map(TagsInput::into_tags).unwrap_or_default(),
            author: optional_plain(request.author.as_deref()),
        }
    })
}

/// Validate an update payload and sanitize whichever fields it carries.
pub fn validate_and_sanitize_update(
    request: UpdateComponentRequest,
    policy: ScriptPolicy,
) -> Result<ComponentPatch, ValidationErrors> {
    if request.is_empty() {
        return Err(ValidationErrors::single(
            BODY_FIELD,
            "at least one field must be provided",
        ));
    }

    let mut check = Checker::default();
    if let Some(name) = &request.name {
        check.non_empty("name", name);
        check.max_len("name", name, MAX_NAME_LEN);
        if sanitize_plain_text(name).is_empty() && !name.trim().is_empty() {
            check.push("name", "must contain displayable text");
        }
    }
    if let Some(category) = &request.category {
        check.max_len("category", category, MAX_CATEGORY_LEN);
    }
    for (field, value) in [("html", &request.html), ("css", &request.css), ("js", &request.js)] {
        if let Some(value) = value {
            check.max_len(field, value, MAX_CONTENT_LEN);
        }
    }
    if let Some(author) = &request.author {
        check.max_len("author", author, MAX_AUTHOR_LEN);
    }

    check.finish(|| {
        let content = sanitize_content(
            request.html.as_deref().unwrap_or_default(),
            request.css.as_deref().unwrap_or_default(),
            request.js.as_deref().unwrap_or_default(),
            policy,
        );
        ComponentPatch {
            name: request.name.as_deref().map(sanitize_plain_text),
            category: request
                .category
                .as_deref()
                .map(|c| plain_or(Some(c), DEFAULT_CATEGORY)),
            html: request.html.is_some().then_some(content.html),
            css: request.css.is_some().then_some(content.css),
            js: request.js.is_some().then_some(content.js),
            tags: request.tags.map(TagsInput::into_tags),
            author: optional_plain(request.author.as_deref()),
        }
    })
}
