//! Case-insensitive, gap-tolerant pattern removal.
//!
//! Browsers ignore embedded tabs and newlines in URL schemes (`java\tscript:`)
//! and case everywhere, so patterns match ASCII case-insensitively and allow
//! ASCII whitespace/control bytes between any two needle characters. A space
//! in the needle requires at least one whitespace byte.

/// A needle to strip. Needles are lowercase ASCII.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pattern {
    needle: &'static str,
    /// Only match where the preceding byte is not part of an identifier.
    word_start: bool,
}

impl Pattern {
    pub(crate) const fn anywhere(needle: &'static str) -> Self {
        Self {
            needle,
            word_start: false,
        }
    }

    pub(crate) const fn word(needle: &'static str) -> Self {
        Self {
            needle,
            word_start: true,
        }
    }
}

fn is_gap(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte < 0x20 || byte == 0x7f
}

fn is_ident(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

/// Length of the match of `needle` starting exactly at `start`, if any.
fn match_at(hay: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    let mut j = start;
    let mut k = 0;
    while k < needle.len() {
        let expected = needle[k];
        if expected == b' ' {
            let run_start = j;
            while j < hay.len() && is_gap(hay[j]) {
                j += 1;
            }
            if j == run_start {
                return None;
            }
            k += 1;
            continue;
        }
        let byte = *hay.get(j)?;
        if byte.to_ascii_lowercase() == expected {
            j += 1;
            k += 1;
        } else if k > 0 && is_gap(byte) {
            j += 1;
        } else {
            return None;
        }
    }
    Some(j - start)
}

/// Find the first match of `pattern` at or after `from`, as a byte range.
pub(crate) fn find(hay: &str, pattern: Pattern, from: usize) -> Option<(usize, usize)> {
    let bytes = hay.as_bytes();
    let needle = pattern.needle.as_bytes();
    let first = *needle.first()?;
    (from..bytes.len()).find_map(|i| {
        if bytes[i].to_ascii_lowercase() != first {
            return None;
        }
        if pattern.word_start && i > 0 && is_ident(bytes[i - 1]) {
            return None;
        }
        match_at(bytes, i, needle).map(|len| (i, i + len))
    })
}

/// Whether any of `patterns` occurs in `hay`.
pub(crate) fn contains_any(hay: &str, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| find(hay, *p, 0).is_some())
}

/// Start of a match of `needle` that ends exactly at the end of `hay`.
/// The mirror image of [`match_at`]: gaps may sit between needle bytes but
/// never before the first or after the last.
fn match_ending_at_end(hay: &[u8], needle: &[u8]) -> Option<usize> {
    let mut j = hay.len();
    for (k, &expected) in needle.iter().enumerate().rev() {
        if expected == b' ' {
            let run_end = j;
            while j > 0 && is_gap(hay[j - 1]) {
                j -= 1;
            }
            if j == run_end {
                return None;
            }
            continue;
        }
        loop {
            let byte = *hay.get(j.checked_sub(1)?)?;
            if byte.to_ascii_lowercase() == expected {
                j -= 1;
                break;
            }
            if k + 1 < needle.len() && is_gap(byte) {
                j -= 1;
            } else {
                return None;
            }
        }
    }
    Some(j)
}

/// Remove every occurrence of every pattern, including occurrences that a
/// removal splices together from the text on either side.
///
/// Output is built as a stack in a single forward pass: after each byte is
/// pushed, a match ending at the top is popped off. The kept prefix never
/// contains a match, so nothing is rescanned.
pub(crate) fn remove_all(input: &str, patterns: &[Pattern]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(input.len());
    for &byte in input.as_bytes() {
        out.push(byte);
        let last = byte.to_ascii_lowercase();
        for pattern in patterns {
            let needle = pattern.needle.as_bytes();
            if needle.last() != Some(&last) {
                continue;
            }
            let Some(start) = match_ending_at_end(&out, needle) else {
                continue;
            };
            if pattern.word_start && start > 0 && is_ident(out[start - 1]) {
                continue;
            }
            out.truncate(start);
            break;
        }
    }
    // Matches are pure ASCII, so truncating at their start keeps UTF-8 intact.
    String::from_utf8(out).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}
