// @zen-component: SAN-Style
//
//! Stylesheet and inline-style sanitization.
//!
//! Works on both full stylesheets (`a { color: red }`) and bare declaration
//! lists from `style="..."` attributes, since both split into declarations
//! on the same delimiters.

use super::patterns::{Pattern, find, remove_all};
use super::until_stable;

/// At-rules that load or reinterpret external resources.
const FORBIDDEN_AT_RULES: [&str; 3] = ["@import", "@charset", "@namespace"];

/// Properties that bind script or behaviours to elements.
const FORBIDDEN_PROPERTIES: [&str; 4] = ["behavior", "-ms-behavior", "binding", "-moz-binding"];

/// Properties that must not load a URL.
const NO_URL_PROPERTIES: [&str; 2] = ["content", "background"];

const SCRIPT_URIS: [Pattern; 2] = [
    Pattern::anywhere("javascript:"),
    Pattern::anywhere("vbscript:"),
];

const EXPRESSION: Pattern = Pattern::anywhere("expression(");

/// Highest `z-index` a component may claim.
pub const MAX_Z_INDEX: i64 = 9999;

/// Sanitize CSS text.
pub fn sanitize_style(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }
    until_stable(input, run_passes)
}

fn run_passes(input: &str) -> String {
    let css = remove_comments(input);
    let css = remove_at_rules(&css);
    let css = remove_all(&css, &SCRIPT_URIS);
    let css = rewrite_urls(&css);
    let css = filter_declarations(&css);
    collapse(&css)
}

/// Drop `/* ... */` comments. An unterminated comment runs to the end.
fn remove_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > bytes.len() {
        return None;
    }
    (from..=bytes.len() - needle.len()).find(|&i| bytes[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Length of the longest entry in [`FORBIDDEN_AT_RULES`].
const LONGEST_AT_RULE: usize = 10;

fn earliest_at_rule(css: &str, from: usize) -> Option<usize> {
    FORBIDDEN_AT_RULES
        .iter()
        .filter_map(|rule| find_ci(css, rule, from))
        .min()
}

/// Remove forbidden at-rules through their terminating `;`, or through the
/// end of input when unterminated. A removal can join the text on either
/// side into a new at-rule, which is caught when its `;` arrives.
fn remove_at_rules(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    // No forbidden at-rule starts before this offset, and no `;` follows it.
    let mut scan_from = 0;
    for c in css.chars() {
        out.push(c);
        if c != ';' {
            continue;
        }
        match earliest_at_rule(&out, scan_from) {
            Some(start) => {
                out.truncate(start);
                scan_from = scan_from.max(start.saturating_sub(LONGEST_AT_RULE - 1));
            }
            None => scan_from = out.len(),
        }
    }
    if let Some(start) = earliest_at_rule(&out, scan_from) {
        out.truncate(start);
    }
    out
}

/// Whether a `url(...)` target is allowed.
fn is_allowed_url(target: &str) -> bool {
    let compact: String = target
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if compact.contains("javascript:") || compact.contains("vbscript:") {
        return false;
    }
    compact.starts_with("https:")
        || compact.starts_with("http:")
        || compact.starts_with("data:image/")
        || compact.starts_with("data:font/")
        || (compact.starts_with('/') && !compact.starts_with("//"))
}

/// End offset (exclusive) of the `url(` group opening at `open`, honouring
/// quotes and nested parentheses.
fn url_group_end(css: &str, open: usize) -> usize {
    let bytes = css.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    bytes.len()
}

/// Replace every disallowed `url(...)` with an empty `url()`.
fn rewrite_urls(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    while let Some(start) = find_ci(css, "url(", cursor) {
        let open = start + 3;
        let end = url_group_end(css, open);
        let inner_end = if css[..end].ends_with(')') { end - 1 } else { end };
        let target = css[open + 1..inner_end]
            .trim()
            .trim_matches(|c| c == '"' || c == '\'');
        out.push_str(&css[cursor..start]);
        if is_allowed_url(target) {
            out.push_str(&css[start..end]);
        } else {
            out.push_str("url()");
        }
        cursor = end;
    }
    out.push_str(&css[cursor..]);
    out
}

/// Resolve CSS escapes (`\65` or `\e`) so checks see what the browser sees.
fn decode_escapes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            if let Some(next) = chars.next() {
                out.push(next);
            }
            continue;
        }
        if chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            chars.next();
        }
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or('\u{fffd}');
        out.push(decoded);
    }
    out
}

/// Rewrite or drop one declaration. `None` drops it.
fn sanitize_declaration(segment: &str) -> Option<String> {
    let Some((property, value)) = segment.split_once(':') else {
        return Some(segment.to_string());
    };
    let prop = decode_escapes(property).trim().to_ascii_lowercase();
    let plain_value = decode_escapes(value).to_ascii_lowercase();

    if FORBIDDEN_PROPERTIES.contains(&prop.as_str()) {
        return None;
    }
    if find(&plain_value, EXPRESSION, 0).is_some() {
        return None;
    }
    if prop.ends_with("filter") && plain_value.contains("progid") {
        return None;
    }
    if NO_URL_PROPERTIES.contains(&prop.as_str()) && plain_value.contains("url(") {
        return None;
    }

    let important = plain_value.contains("!important");
    let bare_value = plain_value.replace("!important", "");
    let bare_value = bare_value.trim();
    let suffix = if important { " !important" } else { "" };

    if prop == "position" && bare_value == "fixed" {
        return Some(format!("{}: absolute{suffix}", property.trim_end()));
    }
    if prop == "z-index" && exceeds_max_z_index(bare_value) {
        return Some(format!("{}: {MAX_Z_INDEX}{suffix}", property.trim_end()));
    }
    Some(segment.to_string())
}

/// Whether an integer `z-index` value is above [`MAX_Z_INDEX`]. Integers
/// too large for `i64` are above it too.
fn exceeds_max_z_index(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    digits.parse::<i64>().map_or(true, |z| z > MAX_Z_INDEX)
}

/// Split on `{`, `}` and `;` outside quotes and parentheses, passing each
/// declaration through [`sanitize_declaration`]. Selector text (segments
/// ending at `{`) passes through untouched.
fn filter_declarations(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut segment_start = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in css.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => continue,
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                '{' if depth == 0 => {
                    out.push_str(&css[segment_start..=i]);
                    segment_start = i + 1;
                }
                ';' | '}' if depth == 0 => {
                    if let Some(kept) = sanitize_declaration(&css[segment_start..i]) {
                        out.push_str(&kept);
                        out.push(c);
                    } else if c == '}' {
                        out.push(c);
                    }
                    segment_start = i + 1;
                }
                _ => {}
            },
        }
    }
    if let Some(kept) = sanitize_declaration(&css[segment_start..]) {
        out.push_str(&kept);
    }
    out
}

/// Collapse whitespace, drop empty declarations and trim.
fn collapse(css: &str) -> String {
    let mut spaced = String::with_capacity(css.len());
    let mut in_space = false;
    for c in css.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                spaced.push(' ');
            }
            in_space = true;
        } else {
            spaced.push(c);
            in_space = false;
        }
    }

    let mut out = String::with_capacity(spaced.len());
    for c in spaced.chars() {
        if c == ';' {
            let trimmed = out.trim_end();
            if trimmed.is_empty() || trimmed.ends_with([';', '{']) {
                out.truncate(trimmed.len());
                continue;
            }
        }
        out.push(c);
    }
    out.trim_matches(|c: char| c.is_ascii_whitespace() || c == ';')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_declarations_pass_through() {
        assert_eq!(sanitize_style("color: red; margin: 0 auto"), "color: red; margin: 0 auto");
    }

    #[test]
    fn stylesheets_pass_through() {
        let css = ".card { padding: 8px; border-radius: 4px; } .card:hover { color: blue; }";
        assert_eq!(sanitize_style(css), css);
    }

    #[test]
    fn comments_are_removed() {
        assert_eq!(sanitize_style("a { color: red; /* note */ }"), "a { color: red; }");
        assert_eq!(sanitize_style("color: red; /* unterminated"), "color: red");
    }

    #[test]
    fn import_is_removed() {
        assert_eq!(
            sanitize_style("@import url(https://evil.test/x.css); p { margin: 0 }"),
            "p { margin: 0 }"
        );
    }

    #[test]
    fn expression_is_removed() {
        assert_eq!(sanitize_style("color: red; width: expression(alert(1))"), "color: red");
        assert_eq!(sanitize_style(r"width: e\78pression(alert(1))"), "");
    }

    #[test]
    fn behaviours_and_bindings_are_removed() {
        assert_eq!(sanitize_style("behavior: url(x.htc); color: red"), "color: red");
        assert_eq!(sanitize_style("-moz-binding: url(x.xml#x)"), "");
    }

    #[test]
    fn ie_filters_are_removed() {
        assert_eq!(
            sanitize_style("filter: progid:DXImageTransform.Microsoft.Alpha(opacity=50); opacity: .5"),
            "opacity: .5"
        );
    }

    #[test]
    fn urls_are_restricted() {
        assert_eq!(
            sanitize_style("background-image: url('https://cdn.test/a.png')"),
            "background-image: url('https://cdn.test/a.png')"
        );
        assert_eq!(
            sanitize_style("background-image: url(/img/a.png)"),
            "background-image: url(/img/a.png)"
        );
        assert_eq!(
            sanitize_style("background-image: url(javascript:alert(1))"),
            "background-image: url()"
        );
        assert_eq!(
            sanitize_style("background-image: url(//evil.test/a.png)"),
            "background-image: url()"
        );
    }

    #[test]
    fn content_and_background_may_not_load_urls() {
        assert_eq!(sanitize_style("background: url(https://x.test/a.png) red"), "");
        assert_eq!(sanitize_style(r#"content: "\201C""#), r#"content: "\201C""#);
    }

    #[test]
    fn fixed_positioning_becomes_absolute() {
        assert_eq!(sanitize_style("position: fixed; top: 0"), "position: absolute; top: 0");
        assert_eq!(
            sanitize_style("position:fixed !important"),
            "position: absolute !important"
        );
    }

    #[test]
    fn z_index_is_capped() {
        assert_eq!(sanitize_style("z-index: 2147483647"), "z-index: 9999");
        assert_eq!(sanitize_style("z-index: 10"), "z-index: 10");
        assert_eq!(sanitize_style("z-index: -5"), "z-index: -5");
        assert_eq!(sanitize_style("z-index: auto"), "z-index: auto");
    }

    #[test]
    fn z_index_beyond_integer_range_is_capped() {
        assert_eq!(sanitize_style("z-index: 99999999999999999999"), "z-index: 9999");
        assert_eq!(
            sanitize_style(".modal { z-index: +99999999999999999999 !important; }"),
            ".modal { z-index: 9999 !important; }"
        );
    }

    #[test]
    fn spliced_at_rules_are_removed() {
        assert_eq!(sanitize_style("@imp@import x;ort url(a.css); p { margin: 0 }"), "p { margin: 0 }");
    }

    #[test]
    fn longest_at_rule_matches_the_list() {
        let longest = FORBIDDEN_AT_RULES.iter().map(|r| r.len()).max();
        assert_eq!(longest, Some(LONGEST_AT_RULE));
    }

    #[test]
    fn many_at_rules_stay_linear() {
        let input = format!("{}{}", "a".repeat(20_000), "@import x;".repeat(3_000));
        let started = std::time::Instant::now();
        assert_eq!(sanitize_style(&input), "a".repeat(20_000));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn redundant_separators_are_collapsed() {
        assert_eq!(sanitize_style("color: red;;  ; margin:\n0;"), "color: red; margin: 0");
    }

    proptest! {
        #[test]
        fn sanitizing_is_idempotent(input in "[a-z :;{}()/*@.!#'\"0-9-]{0,60}") {
            let once = sanitize_style(&input);
            prop_assert_eq!(sanitize_style(&once), once);
        }
    }
}
