//! # snipbox_core
//!
//! Core domain logic for Snipbox: authentication, sessions, CSRF scoring,
//! payload validation and content sanitization for stored UI components.
//! Nothing in here depends on an HTTP framework.

pub mod auth;
pub mod components;
pub mod error;
pub mod migrate;
pub mod models;
pub mod sanitize;
pub mod uuid;
pub mod validation;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
