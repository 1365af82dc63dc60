//! A small, forgiving HTML tokenizer and renderer.
//!
//! Markup is parsed into a flat token stream, filtered, and re-serialized,
//! so every pass sees the same view of tag boundaries as the next one.
//! Comments, doctypes and processing instructions are dropped at parse
//! time. Anything that does not parse as a tag is text.

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attr {
    /// Lowercased attribute name.
    pub name: String,
    /// Entity-decoded value; `None` for bare attributes.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag {
    /// Lowercased element name.
    pub name: String,
    pub closing: bool,
    pub self_closing: bool,
    pub attrs: Vec<Attr>,
}

impl Tag {
    pub(crate) fn is_open(&self, name: &str) -> bool {
        !self.closing && self.name == name
    }

    pub(crate) fn is_close(&self, name: &str) -> bool {
        self.closing && self.name == name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Text(String),
    /// Body of a `<script>` or `<style>` element.
    RawText(String),
    Tag(Tag),
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

fn is_attr_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'' | b'<')
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Byte offset of `needle` (lowercase ASCII) at or after `from`, ignoring case.
fn find_ci(bytes: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.len() > bytes.len() {
        return None;
    }
    (from..=bytes.len() - needle.len()).find(|&i| bytes[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Why the text at a `<` did not become a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NotATag {
    /// No tag name follows the `<`; it is a literal character.
    Literal,
    /// A tag opened but never closed before the end of input. Browsers drop
    /// such a tag, so everything from the `<` on is text.
    Unterminated,
}

/// Parse a tag starting at the `<` at `start`. Returns the tag and the
/// offset just past its `>`.
fn parse_tag(input: &str, start: usize) -> Result<(Tag, usize), NotATag> {
    let bytes = input.as_bytes();
    let mut i = start + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    if !bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        return Err(NotATag::Literal);
    }
    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = input[name_start..i].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        i = skip_ws(bytes, i);
        match bytes.get(i).ok_or(NotATag::Unterminated)? {
            b'>' => {
                return Ok((
                    Tag {
                        name,
                        closing,
                        self_closing,
                        attrs,
                    },
                    i + 1,
                ));
            }
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            b if !is_attr_name_byte(*b) => {
                // Stray quote, `=` or `<` where a name belongs.
                self_closing = false;
                i += 1;
                continue;
            }
            _ => {}
        }
        self_closing = false;

        let attr_start = i;
        while i < bytes.len() && is_attr_name_byte(bytes[i]) {
            i += 1;
        }
        let attr_name = input[attr_start..i].to_ascii_lowercase();

        let after_name = skip_ws(bytes, i);
        if bytes.get(after_name) != Some(&b'=') {
            attrs.push(Attr {
                name: attr_name,
                value: None,
            });
            continue;
        }
        i = skip_ws(bytes, after_name + 1);
        let value = match bytes.get(i).ok_or(NotATag::Unterminated)? {
            quote @ (b'"' | b'\'') => {
                let value_start = i + 1;
                let rel_end = bytes[value_start..]
                    .iter()
                    .position(|b| b == quote)
                    .ok_or(NotATag::Unterminated)?;
                i = value_start + rel_end + 1;
                &input[value_start..value_start + rel_end]
            }
            _ => {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                &input[value_start..i]
            }
        };
        attrs.push(Attr {
            name: attr_name,
            value: Some(decode_entities(value)),
        });
    }
}

/// Split `input` into tokens.
pub(crate) fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    let flush = |text: &mut String, tokens: &mut Vec<Token>| {
        if !text.is_empty() {
            tokens.push(Token::Text(decode_entities(text)));
            text.clear();
        }
    };

    while i < bytes.len() {
        let Some(rel) = bytes[i..].iter().position(|b| *b == b'<') else {
            text.push_str(&input[i..]);
            break;
        };
        text.push_str(&input[i..i + rel]);
        i += rel;

        // Comments, doctypes, CDATA and processing instructions.
        if bytes[i..].starts_with(b"<!--") {
            flush(&mut text, &mut tokens);
            i = find_ci(bytes, b"-->", i + 4).map_or(bytes.len(), |end| end + 3);
            continue;
        }
        if matches!(bytes.get(i + 1), Some(b'!' | b'?')) {
            flush(&mut text, &mut tokens);
            i = find_ci(bytes, b">", i + 2).map_or(bytes.len(), |end| end + 1);
            continue;
        }

        let (tag, end) = match parse_tag(input, i) {
            Ok(parsed) => parsed,
            Err(NotATag::Literal) => {
                text.push('<');
                i += 1;
                continue;
            }
            Err(NotATag::Unterminated) => {
                text.push_str(&input[i..]);
                break;
            }
        };
        flush(&mut text, &mut tokens);
        i = end;

        let raw = !tag.closing
            && !tag.self_closing
            && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str());
        let close_needle = format!("</{}", tag.name);
        tokens.push(Token::Tag(tag));
        if raw {
            let body_end = find_ci(bytes, close_needle.as_bytes(), i).unwrap_or(bytes.len());
            if body_end > i {
                tokens.push(Token::RawText(input[i..body_end].to_string()));
            }
            i = body_end;
        }
    }
    flush(&mut text, &mut tokens);
    tokens
}

/// Serialize a single tag.
pub(crate) fn render_tag(tag: &Tag, out: &mut String) {
    out.push('<');
    if tag.closing {
        out.push('/');
        out.push_str(&tag.name);
        out.push('>');
        return;
    }
    out.push_str(&tag.name);
    for attr in &tag.attrs {
        out.push(' ');
        out.push_str(&attr.name);
        if let Some(value) = &attr.value {
            out.push_str("=\"");
            out.push_str(&encode_attr(value));
            out.push('"');
        }
    }
    if tag.self_closing {
        out.push_str(" /");
    }
    out.push('>');
}

/// Serialize a token stream back to markup.
pub(crate) fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(&encode_text(text)),
            Token::RawText(raw) => out.push_str(raw),
            Token::Tag(tag) => render_tag(tag, &mut out),
        }
    }
    out
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "colon" => ':',
        "lpar" => '(',
        "rpar" => ')',
        "tab" => '\t',
        "newline" => '\n',
        _ => return None,
    })
}

/// Decode one character reference at the start of `s` (which begins with
/// `&`). Returns the character and the number of bytes consumed.
fn decode_one(s: &str) -> Option<(char, usize)> {
    let bytes = s.as_bytes();
    if bytes.get(1) == Some(&b'#') {
        let hex = matches!(bytes.get(2), Some(b'x' | b'X'));
        let digits_start = if hex { 3 } else { 2 };
        let mut end = digits_start;
        while end < bytes.len()
            && end - digits_start < 8
            && (if hex {
                bytes[end].is_ascii_hexdigit()
            } else {
                bytes[end].is_ascii_digit()
            })
        {
            end += 1;
        }
        if end == digits_start {
            return None;
        }
        let code = u32::from_str_radix(&s[digits_start..end], if hex { 16 } else { 10 }).ok()?;
        let c = char::from_u32(code).filter(|c| *c != '\0')?;
        let consumed = if bytes.get(end) == Some(&b';') { end + 1 } else { end };
        return Some((c, consumed));
    }
    let name_len = bytes[1..]
        .iter()
        .take(10)
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if bytes.get(1 + name_len) != Some(&b';') {
        return None;
    }
    let c = named_entity(&s[1..1 + name_len].to_ascii_lowercase())?;
    Some((c, name_len + 2))
}

/// Decode character references whose decoded character satisfies `keep`.
pub(crate) fn decode_entities_where(input: &str, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match decode_one(rest).filter(|(c, _)| keep(*c)) {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode all recognized character references.
pub(crate) fn decode_entities(input: &str) -> String {
    decode_entities_where(input, |_| true)
}

/// Encode text content. Only markup-significant characters are escaped.
pub(crate) fn encode_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Encode a double-quoted attribute value.
pub(crate) fn encode_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
