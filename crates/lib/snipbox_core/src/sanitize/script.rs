// @zen-component: SAN-Script
//
//! Script sanitization.
//!
//! Component scripts are shown in a sandboxed preview, so the relaxed policy
//! only removes dynamic code evaluation and markup injection. The paranoid
//! policy replaces the whole script when it touches any network, storage or
//! navigation API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::patterns::{Pattern, contains_any, remove_all};

/// Constructs removed under every policy.
const STRIPPED: [Pattern; 10] = [
    Pattern::word("eval("),
    Pattern::word("new function("),
    Pattern::word("document.write("),
    Pattern::word("document.writeln("),
    Pattern::word("import("),
    Pattern::word("require("),
    Pattern::anywhere("<script"),
    Pattern::anywhere("</script"),
    Pattern::anywhere("javascript:"),
    Pattern::anywhere("vbscript:"),
];

/// APIs that make the paranoid policy discard the script.
const RESTRICTED: [Pattern; 24] = [
    Pattern::word("fetch("),
    Pattern::word("xmlhttprequest"),
    Pattern::word("websocket"),
    Pattern::word("eventsource"),
    Pattern::word("document.cookie"),
    Pattern::word("localstorage"),
    Pattern::word("sessionstorage"),
    Pattern::word("indexeddb"),
    Pattern::word("window.location"),
    Pattern::word("location.href"),
    Pattern::word("location.assign("),
    Pattern::word("location.replace("),
    Pattern::word("window.open("),
    Pattern::word("innerhtml"),
    Pattern::word("outerhtml"),
    Pattern::word("insertadjacenthtml"),
    Pattern::word("navigator.sendbeacon"),
    Pattern::word("postmessage("),
    Pattern::word("importscripts("),
    Pattern::word("__proto__"),
    // timers given a string body evaluate it
    Pattern::word("settimeout(\""),
    Pattern::word("settimeout('"),
    Pattern::word("setinterval(\""),
    Pattern::word("setinterval('"),
];

/// Replacement for scripts rejected by [`ScriptPolicy::Paranoid`].
pub const PARANOID_PLACEHOLDER: &str = "// script removed: uses restricted browser APIs";

/// How aggressively scripts are sanitized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptPolicy {
    /// Strip dynamic evaluation and markup injection; keep everything else.
    #[default]
    Relaxed,
    /// Additionally reject scripts using network, storage or navigation APIs.
    Paranoid,
}

impl fmt::Display for ScriptPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relaxed => write!(f, "relaxed"),
            Self::Paranoid => write!(f, "paranoid"),
        }
    }
}

impl FromStr for ScriptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relaxed" => Ok(Self::Relaxed),
            "paranoid" => Ok(Self::Paranoid),
            other => Err(format!("unknown script policy: {other}")),
        }
    }
}

/// Sanitize a script under the relaxed policy.
pub fn sanitize_script(input: &str) -> String {
    sanitize_script_with(input, ScriptPolicy::Relaxed)
}

/// Sanitize a script under `policy`.
pub fn sanitize_script_with(input: &str, policy: ScriptPolicy) -> String {
    if input.trim().is_empty() {
        return String::new();
    }
    let cleaned = normalize_whitespace(&remove_all(input, &STRIPPED));
    if policy == ScriptPolicy::Paranoid
        && (contains_any(input, &RESTRICTED) || contains_any(&cleaned, &RESTRICTED))
    {
        return PARANOID_PLACEHOLDER.to_string();
    }
    cleaned
}

/// Unix line endings, no trailing spaces, at most one blank line in a row.
fn normalize_whitespace(script: &str) -> String {
    let unix = script.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unix.len());
    let mut blank_run = 0;
    for line in unix.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
