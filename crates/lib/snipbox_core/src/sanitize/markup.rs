// @zen-component: SAN-Markup
//
//! Markup sanitization.
//!
//! Passes run in a fixed order and every pass re-tokenizes its input:
//!
//! 1. strip dangerous constructs (script blocks, frames, embeds, event
//!    handlers, script-bearing URIs)
//! 2. SVG-specific stripping, when the markup contains SVG
//! 3. entity normalization of text, followed by another dangerous-construct strip
//! 4. tag and attribute allow-lists
//! 5. a final dangerous-construct strip
//! 6. empty-element collapse and whitespace normalization
//!
//! Running the whole pipeline on its own output changes nothing.

use super::html::{Attr, Tag, Token, render, tokenize};
use super::patterns::{Pattern, remove_all};
use super::style::sanitize_style;
use super::until_stable;

/// Elements removed together with their content.
const BLOCK_ELEMENTS: [&str; 6] = ["script", "iframe", "object", "frameset", "noembed", "applet"];

/// Elements removed on their own (void, or content is harmless).
const VOID_ELEMENTS_REMOVED: [&str; 5] = ["embed", "link", "meta", "base", "frame"];

/// Script-bearing URI schemes, matched with embedded whitespace tolerated.
const DANGEROUS_URIS: [Pattern; 3] = [
    Pattern::anywhere("javascript:"),
    Pattern::anywhere("vbscript:"),
    Pattern::anywhere("data:text/html"),
];

/// Attributes whose value is fetched or navigated to. When one of these
/// carried a script-bearing URI the whole attribute goes.
const URI_ATTRS: [&str; 9] = [
    "href",
    "src",
    "action",
    "formaction",
    "xlink:href",
    "data",
    "poster",
    "background",
    "srcset",
];

/// Encoded forms of `<script` that survive naive entity handling.
const ENCODED_SCRIPT_OPENERS: [Pattern; 6] = [
    Pattern::anywhere("&lt;script"),
    Pattern::anywhere("&#60;script"),
    Pattern::anywhere("&#x3c;script"),
    Pattern::anywhere("\\u003cscript"),
    Pattern::anywhere("\\x3cscript"),
    Pattern::anywhere("%3cscript"),
];

/// SVG elements removed inside `<svg>`.
const SVG_FORBIDDEN: [&str; 8] = [
    "use",
    "image",
    "feimage",
    "animate",
    "animatemotion",
    "animatetransform",
    "animatecolor",
    "set",
];

/// Attributes removed from every element inside `<svg>`.
const SVG_FORBIDDEN_ATTRS: [&str; 2] = ["href", "xlink:href"];

const ALLOWED_TAGS: &[&str] = &[
    // structure and text
    "div", "span", "p", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
    "header", "footer", "main", "nav", "aside", "figure", "figcaption", "blockquote", "pre",
    "code", "kbd", "samp", "small", "strong", "em", "b", "i", "u", "s", "mark", "sub", "sup",
    "abbr", "cite", "q", "time", "address", "details", "summary", "a", "img", "picture",
    "source",
    // lists and tables
    "ul", "ol", "li", "dl", "dt", "dd", "table", "thead", "tbody", "tfoot", "tr", "th", "td",
    "caption", "colgroup", "col",
    // forms
    "form", "label", "input", "button", "select", "option", "optgroup", "textarea", "fieldset",
    "legend", "progress", "meter", "output",
    // svg
    "svg", "g", "path", "circle", "ellipse", "line", "polyline", "polygon", "rect", "text",
    "tspan", "defs", "lineargradient", "radialgradient", "stop", "clippath", "mask", "symbol",
];

const ALLOWED_ATTRS: &[&str] = &[
    // global
    "id", "class", "style", "title", "lang", "dir", "hidden", "role", "tabindex",
    // links and media
    "href", "src", "srcset", "alt", "target", "rel", "width", "height", "loading", "decoding",
    "media", "sizes",
    // forms
    "type", "name", "value", "placeholder", "disabled", "checked", "readonly", "selected",
    "multiple", "required", "for", "min", "max", "step", "maxlength", "minlength", "rows",
    "cols", "wrap", "label", "size", "autocomplete",
    // tables and text
    "colspan", "rowspan", "scope", "headers", "open", "datetime", "cite", "start", "reversed",
    // svg
    "viewbox", "xmlns", "d", "fill", "fill-rule", "clip-rule", "fill-opacity", "stroke",
    "stroke-width", "stroke-linecap", "stroke-linejoin", "stroke-dasharray", "stroke-opacity",
    "opacity", "cx", "cy", "r", "rx", "ry", "x", "y", "x1", "y1", "x2", "y2", "dx", "dy",
    "points", "transform", "offset", "stop-color", "stop-opacity", "gradientunits",
    "gradienttransform", "preserveaspectratio", "font-size", "font-family", "font-weight",
    "text-anchor", "dominant-baseline", "clip-path",
];

/// Attributes holding a URL.
const URL_ATTRS: [&str; 2] = ["href", "src"];

/// Elements kept even when empty.
const KEEP_WHEN_EMPTY: [&str; 3] = ["td", "th", "textarea"];

/// Sanitize user-supplied markup.
pub fn sanitize_markup(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }
    until_stable(input, run_passes)
}

fn run_passes(input: &str) -> String {
    let mut html = strip_dangerous(input);
    if contains_svg(&html) {
        html = strip_svg(&html);
    }
    html = normalize_entities(&html);
    html = strip_dangerous(&html);
    html = apply_allow_lists(&html);
    html = strip_dangerous(&html);
    collapse(&html)
}

fn is_event_handler(attr: &Attr) -> bool {
    attr.name.starts_with("on")
}

fn contains_svg(html: &str) -> bool {
    html.as_bytes()
        .windows(4)
        .any(|w| w.eq_ignore_ascii_case(b"<svg"))
}

/// Drop tokens until the close tag matching the element that started
/// skipping, honouring nesting of the same element.
struct Skipper {
    name: Option<String>,
    depth: usize,
}

impl Skipper {
    fn new() -> Self {
        Self {
            name: None,
            depth: 0,
        }
    }

    fn start(&mut self, name: &str) {
        self.name = Some(name.to_string());
        self.depth = 1;
    }

    /// Returns true while `token` is being skipped.
    fn skips(&mut self, token: &Token) -> bool {
        let Some(name) = &self.name else {
            return false;
        };
        if let Token::Tag(tag) = token
            && tag.name == *name
            && !tag.self_closing
        {
            if tag.closing {
                self.depth -= 1;
                if self.depth == 0 {
                    self.name = None;
                }
            } else {
                self.depth += 1;
            }
        }
        true
    }
}

/// Pass 1: remove script blocks, frames, embeds, event handler attributes
/// and script-bearing URIs.
fn strip_dangerous(input: &str) -> String {
    let input = remove_all(input, &ENCODED_SCRIPT_OPENERS);
    let mut out = Vec::new();
    let mut skipper = Skipper::new();

    for token in tokenize(&input) {
        if skipper.skips(&token) {
            continue;
        }
        match token {
            Token::Tag(tag) if BLOCK_ELEMENTS.contains(&tag.name.as_str()) => {
                if !tag.closing && !tag.self_closing {
                    skipper.start(&tag.name);
                }
            }
            Token::Tag(tag) if VOID_ELEMENTS_REMOVED.contains(&tag.name.as_str()) => {}
            Token::Tag(mut tag) => {
                tag.attrs.retain(|attr| !is_event_handler(attr));
                tag.attrs.retain_mut(|attr| {
                    let Some(value) = &attr.value else {
                        return true;
                    };
                    let scrubbed = remove_all(value, &DANGEROUS_URIS);
                    if scrubbed == *value {
                        return true;
                    }
                    if URI_ATTRS.contains(&attr.name.as_str()) {
                        return false;
                    }
                    attr.value = Some(scrubbed);
                    true
                });
                out.push(Token::Tag(tag));
            }
            other => out.push(other),
        }
    }
    remove_all(&render(&out), &DANGEROUS_URIS)
}

/// Pass 2: SVG can carry script through `foreignObject`, external
/// references and animation of attributes.
fn strip_svg(input: &str) -> String {
    let mut out = Vec::new();
    let mut svg_depth = 0usize;
    let mut skipper = Skipper::new();

    for token in tokenize(input) {
        if skipper.skips(&token) {
            continue;
        }
        let Token::Tag(mut tag) = token else {
            out.push(token);
            continue;
        };
        if tag.name == "svg" && !tag.self_closing {
            if tag.closing {
                svg_depth = svg_depth.saturating_sub(1);
            } else {
                svg_depth += 1;
            }
        }
        let in_svg = svg_depth > 0 || tag.name == "svg";
        if !in_svg {
            out.push(Token::Tag(tag));
            continue;
        }
        if tag.name == "foreignobject" {
            if !tag.closing && !tag.self_closing {
                skipper.start(&tag.name);
            }
            continue;
        }
        if SVG_FORBIDDEN.contains(&tag.name.as_str()) {
            continue;
        }
        tag.attrs
            .retain(|attr| !SVG_FORBIDDEN_ATTRS.contains(&attr.name.as_str()));
        out.push(Token::Tag(tag));
    }
    render(&out)
}

/// Pass 3: re-serialize so text carries exactly one canonical encoding of
/// `<`, `>` and `&`, however the input spelled them. Encoded brackets stay
/// text; decoding them into markup would make the output drift on re-runs.
fn normalize_entities(input: &str) -> String {
    render(&tokenize(input))
}

fn is_allowed_attr_name(name: &str) -> bool {
    if ALLOWED_ATTRS.contains(&name) {
        return true;
    }
    let custom = name
        .strip_prefix("data-")
        .or_else(|| name.strip_prefix("aria-"));
    custom.is_some_and(|rest| {
        !rest.is_empty()
            && rest
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    })
}

/// Whether a URL attribute value is safe to keep.
fn is_safe_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if compact.is_empty() || compact.starts_with(['#', '/', '?', '.']) {
        return true;
    }
    let scheme_end = compact.find([':', '/', '?', '#']);
    match scheme_end {
        Some(end) if compact.as_bytes()[end] == b':' => {
            let scheme = &compact[..end];
            match scheme {
                "http" | "https" | "mailto" | "tel" => true,
                "data" => ["data:image/png", "data:image/jpeg", "data:image/gif", "data:image/webp"]
                    .iter()
                    .any(|prefix| compact.starts_with(prefix)),
                _ => false,
            }
        }
        // No scheme: a relative reference.
        _ => true,
    }
}

fn filter_attrs(tag: &mut Tag) {
    let attrs = std::mem::take(&mut tag.attrs);
    tag.attrs = attrs
        .into_iter()
        .filter(|attr| is_allowed_attr_name(&attr.name))
        .filter_map(|mut attr| {
            if attr.name == "style" {
                let style = sanitize_style(attr.value.as_deref().unwrap_or_default());
                if style.is_empty() {
                    return None;
                }
                attr.value = Some(style);
            } else if URL_ATTRS.contains(&attr.name.as_str())
                && !attr.value.as_deref().is_some_and(is_safe_url)
            {
                return None;
            }
            Some(attr)
        })
        .collect();
}

/// Pass 4: keep only allow-listed elements and attributes. Disallowed
/// elements are unwrapped; their text content stays.
fn apply_allow_lists(input: &str) -> String {
    let mut out = Vec::new();
    for token in tokenize(input) {
        match token {
            Token::Text(_) => out.push(token),
            // Bodies of `<style>` and anything else raw never survive.
            Token::RawText(_) => {}
            Token::Tag(mut tag) => {
                if !ALLOWED_TAGS.contains(&tag.name.as_str()) {
                    continue;
                }
                if tag.closing {
                    tag.attrs.clear();
                } else {
                    filter_attrs(&mut tag);
                }
                out.push(Token::Tag(tag));
            }
        }
    }
    render(&out)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn is_empty_pair(open: &Token, close: &Token) -> bool {
    let (Token::Tag(open), Token::Tag(close)) = (open, close) else {
        return false;
    };
    open.is_open(&close.name)
        && close.is_close(&open.name)
        && !open.self_closing
        && open.attrs.is_empty()
        && !KEEP_WHEN_EMPTY.contains(&open.name.as_str())
}

/// Pass 6: drop attribute-less empty element pairs (nested empties vanish
/// too), collapse whitespace runs and trim.
fn collapse(input: &str) -> String {
    let mut kept: Vec<Token> = Vec::new();
    for token in tokenize(input) {
        let token = match token {
            Token::Text(text) => {
                let text = collapse_whitespace(&text);
                if text.is_empty() {
                    continue;
                }
                Token::Text(text)
            }
            other => other,
        };
        if kept.last().is_some_and(|open| is_empty_pair(open, &token)) {
            kept.pop();
            continue;
        }
        match (kept.last_mut(), token) {
            (Some(Token::Text(prev)), Token::Text(next)) => join_text(prev, &next),
            (_, token) => kept.push(token),
        }
    }
    render(&kept).trim().to_string()
}

/// Append already-collapsed `next` to `prev`, keeping a single space at
/// the seam.
fn join_text(prev: &mut String, next: &str) {
    let next = if prev.ends_with(' ') {
        next.strip_prefix(' ').unwrap_or(next)
    } else {
        next
    };
    prev.push_str(next);
}
