// @zen-component: AUTH-CsrfGuard
//
//! Heuristic CSRF scoring for mutating requests.
//!
//! The API is stateless and consumed cross-origin, so instead of synchronizer
//! tokens each mutating request is scored on three independent signals:
//!
//! - **origin**: `Origin` (or, failing that, `Referer`) is on the allow-list
//! - **header**: a custom header only a programmatic client would send
//! - **bearer**: an `Authorization: Bearer ...` header is present
//!
//! Production mode needs two signals, development mode one.

use http::header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN, REFERER};
use http::{HeaderMap, Method};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::error::ErrorCategory;

/// Production front-end origin.
pub const DEFAULT_PRODUCTION_ORIGIN: &str = "https://component-management.vercel.app";

/// Loopback origins accepted in development mode.
pub const DEV_ORIGINS: [&str; 6] = [
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:8080",
];

/// Application-identifying header and its expected value.
pub const APP_HEADER: &str = "x-app-client";
pub const APP_HEADER_VALUE: &str = "component-management";

/// `X-Requested-With` values that count as a programmatic client.
const REQUESTED_WITH_VALUES: [&str; 4] = [
    "xmlhttprequest",
    "fetch",
    "application/json",
    APP_HEADER_VALUE,
];

/// Signals required in production mode.
const PRODUCTION_THRESHOLD: usize = 2;

/// Signals required in development mode.
const DEV_THRESHOLD: usize = 1;

/// CSRF guard settings.
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    pub production_origin: String,
    pub dev_mode: bool,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            production_origin: DEFAULT_PRODUCTION_ORIGIN.to_string(),
            dev_mode: false,
        }
    }
}

/// Status of each signal for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfSignals {
    pub origin: bool,
    pub header: bool,
    pub bearer: bool,
}

impl CsrfSignals {
    pub fn count(&self) -> usize {
        [self.origin, self.header, self.bearer]
            .into_iter()
            .filter(|signal| *signal)
            .count()
    }
}

/// A mutating request that scored below threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("CSRF protection: {passed} of {required} required signals present")]
pub struct CsrfRejection {
    pub signals: CsrfSignals,
    pub passed: usize,
    pub required: usize,
}

impl CsrfRejection {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::ForbiddenCsrf
    }
}

/// Outcome of a passing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfPass {
    /// Read-only method; not evaluated.
    SafeMethod,
    /// Mutating method with enough signals.
    Scored(CsrfSignals),
}

/// Scores mutating requests against the configured origins.
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    allowed_origins: Vec<String>,
    threshold: usize,
}

impl CsrfGuard {
    pub fn new(config: &CsrfConfig) -> Self {
        let mut allowed_origins = Vec::new();
        if let Some(origin) = normalize_origin(&config.production_origin) {
            allowed_origins.push(origin);
        }
        if config.dev_mode {
            allowed_origins.extend(DEV_ORIGINS.iter().filter_map(|o| normalize_origin(o)));
        }
        Self {
            allowed_origins,
            threshold: if config.dev_mode {
                DEV_THRESHOLD
            } else {
                PRODUCTION_THRESHOLD
            },
        }
    }

    /// Origins that satisfy the origin signal.
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    /// Check a request. Read-only methods always pass.
    pub fn check(&self, method: &Method, headers: &HeaderMap) -> Result<CsrfPass, CsrfRejection> {
        if is_safe_method(method) {
            return Ok(CsrfPass::SafeMethod);
        }

        let signals = self.signals(headers);
        let passed = signals.count();
        if passed < self.threshold {
            warn!(
                %method,
                origin = signals.origin,
                header = signals.header,
                bearer = signals.bearer,
                "CSRF check rejected request"
            );
            return Err(CsrfRejection {
                signals,
                passed,
                required: self.threshold,
            });
        }

        debug!(
            %method,
            origin = signals.origin,
            header = signals.header,
            bearer = signals.bearer,
            "CSRF check passed"
        );
        Ok(CsrfPass::Scored(signals))
    }

    /// Evaluate the three signals.
    pub fn signals(&self, headers: &HeaderMap) -> CsrfSignals {
        CsrfSignals {
            origin: self.origin_signal(headers),
            header: header_signal(headers),
            bearer: bearer_signal(headers),
        }
    }

    fn origin_signal(&self, headers: &HeaderMap) -> bool {
        let candidate = header_str(headers, ORIGIN.as_str())
            .filter(|v| !v.is_empty() && *v != "null")
            .or_else(|| header_str(headers, REFERER.as_str()));
        candidate
            .and_then(normalize_origin)
            .is_some_and(|origin| self.allowed_origins.iter().any(|a| *a == origin))
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Reduce an `Origin` or `Referer` value to `scheme://host[:port]`.
fn normalize_origin(value: &str) -> Option<String> {
    let url = Url::parse(value.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

fn header_signal(headers: &HeaderMap) -> bool {
    let requested_with = header_str(headers, "x-requested-with");
    let app_header = header_str(headers, APP_HEADER);

    let recognized_requested_with = requested_with.is_some_and(|value| {
        REQUESTED_WITH_VALUES
            .iter()
            .any(|known| value.eq_ignore_ascii_case(known))
    });
    if recognized_requested_with {
        return true;
    }
    if app_header == Some(APP_HEADER_VALUE) {
        return true;
    }

    // A JSON content type alone can be forged by a plain form post, so it
    // only counts alongside another programmatic header.
    let is_json = header_str(headers, CONTENT_TYPE.as_str()).is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
    });
    let has_companion = requested_with.is_some_and(|v| !v.is_empty())
        || app_header.is_some_and(|v| !v.is_empty())
        || headers.contains_key(AUTHORIZATION);
    is_json && has_companion
}

fn bearer_signal(headers: &HeaderMap) -> bool {
    header_str(headers, AUTHORIZATION.as_str())
        .and_then(bearer_token)
        .is_some()
}

/// Extract the credential from a `Bearer <token>` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn guard(dev_mode: bool) -> CsrfGuard {
        CsrfGuard::new(&CsrfConfig {
            production_origin: DEFAULT_PRODUCTION_ORIGIN.to_string(),
            dev_mode,
        })
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn reads_always_pass() {
        let result = guard(false).check(&Method::GET, &HeaderMap::new());
        assert_eq!(result, Ok(CsrfPass::SafeMethod));
    }

    #[test]
    fn bare_post_is_rejected_in_production() {
        let err = guard(false)
            .check(&Method::POST, &HeaderMap::new())
            .unwrap_err();
        assert_eq!(err.passed, 0);
        assert_eq!(err.required, 2);
        assert_eq!(err.category(), ErrorCategory::ForbiddenCsrf);
    }

    #[test]
    fn origin_plus_requested_with_passes() {
        let h = headers(&[
            ("origin", DEFAULT_PRODUCTION_ORIGIN),
            ("x-requested-with", "XMLHttpRequest"),
        ]);
        let result = guard(false).check(&Method::POST, &h).unwrap();
        assert_eq!(
            result,
            CsrfPass::Scored(CsrfSignals {
                origin: true,
                header: true,
                bearer: false
            })
        );
    }

    #[test]
    fn single_signal_is_not_enough_in_production() {
        let h = headers(&[("origin", DEFAULT_PRODUCTION_ORIGIN)]);
        assert!(guard(false).check(&Method::DELETE, &h).is_err());
    }

    #[test]
    fn single_signal_is_enough_in_dev_mode() {
        let h = headers(&[("origin", "http://localhost:5173")]);
        assert!(guard(true).check(&Method::PUT, &h).is_ok());
    }

    #[test]
    fn loopback_origin_rejected_outside_dev_mode() {
        let h = headers(&[("origin", "http://localhost:5173")]);
        assert!(!guard(false).signals(&h).origin);
    }

    #[test]
    fn referer_used_when_origin_missing() {
        let h = headers(&[("referer", "https://component-management.vercel.app/editor?id=3")]);
        assert!(guard(false).signals(&h).origin);
    }

    #[test]
    fn lookalike_origin_is_rejected() {
        let h = headers(&[("origin", "https://component-management.vercel.app.evil.com")]);
        assert!(!guard(false).signals(&h).origin);
    }

    #[test]
    fn json_content_type_alone_is_not_a_header_signal() {
        let h = headers(&[("content-type", "application/json")]);
        assert!(!guard(false).signals(&h).header);
    }

    #[test]
    fn json_with_authorization_is_a_header_signal() {
        let h = headers(&[
            ("content-type", "application/json; charset=utf-8"),
            ("authorization", "Basic abc"),
        ]);
        assert!(guard(false).signals(&h).header);
    }

    #[test]
    fn app_header_must_match_exactly() {
        let h = headers(&[(APP_HEADER, "something-else")]);
        assert!(!guard(false).signals(&h).header);
        let h = headers(&[(APP_HEADER, APP_HEADER_VALUE)]);
        assert!(guard(false).signals(&h).header);
    }

    #[test]
    fn bearer_presence_counts() {
        let h = headers(&[("authorization", "Bearer anything")]);
        assert!(guard(false).signals(&h).bearer);
        let h = headers(&[("authorization", "Bearer ")]);
        assert!(!guard(false).signals(&h).bearer);
    }

    #[test]
    fn bearer_plus_json_passes_in_production() {
        let h = headers(&[
            ("authorization", "Bearer abc.def.ghi"),
            ("content-type", "application/json"),
        ]);
        assert!(guard(false).check(&Method::POST, &h).is_ok());
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
