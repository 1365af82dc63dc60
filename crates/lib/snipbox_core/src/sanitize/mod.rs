//! Content sanitizers for user-submitted components.
//!
//! Each sanitizer is a pure function from text to text, never fails, and is
//! idempotent: feeding its output back in returns the same string.

mod html;
mod markup;
mod patterns;
mod script;
mod style;

use tracing::debug;

pub use markup::sanitize_markup;
pub use script::{PARANOID_PLACEHOLDER, ScriptPolicy, sanitize_script, sanitize_script_with};
pub use style::{MAX_Z_INDEX, sanitize_style};

/// Upper bound on repetitions in [`until_stable`].
const MAX_PASSES: usize = 4;

/// Apply `pass` until its output stops changing. Removals can splice
/// neighbouring text into something an earlier step would have caught.
pub(crate) fn until_stable(input: &str, pass: impl Fn(&str) -> String) -> String {
    let mut current = pass(input);
    for _ in 1..MAX_PASSES {
        let next = pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Reduce a short free-text field (name, category, author, tag) to plain
/// text: no angle brackets or control characters, single spaces, trimmed.
pub fn sanitize_plain_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
            continue;
        }
        if c == '<' || c == '>' || c.is_control() {
            continue;
        }
        out.push(c);
        in_space = false;
    }
    out.trim().to_string()
}

/// Sanitized form of one submitted component's content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SanitizedContent {
    pub html: String,
    pub css: String,
    pub js: String,
}

/// Run all three content sanitizers, logging which fields changed.
pub fn sanitize_content(html: &str, css: &str, js: &str, policy: ScriptPolicy) -> SanitizedContent {
    let content = SanitizedContent {
        html: sanitize_markup(html),
        css: sanitize_style(css),
        js: sanitize_script_with(js, policy),
    };
    debug!(
        html_changed = content.html != html,
        css_changed = content.css != css,
        js_changed = content.js != js,
        %policy,
        "component content sanitized"
    );
    content
}
