// @zen-component: AUTH-Gateway
//
//! One identity decision per request.
//!
//! The gateway walks an ordered list of [`AuthStrategy`]s (bearer token,
//! session cookie, shared secret). The first strategy that matches wins; a
//! strategy that cannot use the request, or whose credential fails, yields
//! [`Attempt::Skip`] and the next one is tried. Nothing matches →
//! [`AuthError::Unauthenticated`].

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::AuthError;
use super::rate_limit::RateLimiter;
use super::session::SessionStore;
use super::strategies::{BearerTokenStrategy, SessionCookieStrategy, SharedSecretStrategy};
use super::token::TokenCodec;

/// The parts of an inbound request the gateway looks at.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub headers: HeaderMap,
    /// Value of the session cookie, if one was sent.
    pub session_id: Option<String>,
    /// Client identifier (origin IP) for rate limiting and session records.
    pub client_id: String,
}

impl AuthRequest {
    pub fn new(headers: HeaderMap, session_id: Option<String>, client_id: impl Into<String>) -> Self {
        Self {
            headers,
            session_id,
            client_id: client_id.into(),
        }
    }
}

/// Where a request's client identifier comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientIdSource {
    /// The socket peer address. Forwarding headers are ignored, since any
    /// client can send them.
    #[default]
    PeerAddress,
    /// The address reported by a trusted reverse proxy, falling back to the
    /// peer address when the proxy sent none.
    TrustedProxy,
}

/// Headers a reverse proxy uses to report the original client, in order of
/// preference. Only the last `X-Forwarded-For` entry is the proxy's own.
const PROXY_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

fn proxy_reported_ip(headers: &HeaderMap) -> Option<IpAddr> {
    PROXY_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .and_then(|v| v.trim().parse().ok())
    })
}

/// Resolve the client identifier for rate limiting. `None` when no address
/// is known; there is no shared fallback bucket.
pub fn resolve_client_id(
    peer: Option<IpAddr>,
    headers: &HeaderMap,
    source: ClientIdSource,
) -> Option<String> {
    let ip = match source {
        ClientIdSource::PeerAddress => peer,
        ClientIdSource::TrustedProxy => proxy_reported_ip(headers).or(peer),
    };
    ip.map(|ip| ip.to_string())
}

/// How a request authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    BearerToken,
    SessionCookie,
    SharedSecret,
}

/// An authenticated caller. There is exactly one privileged role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub method: AuthMethod,
}

/// Result of one strategy's attempt.
#[derive(Debug)]
pub enum Attempt {
    Matched(Identity),
    /// The strategy did not authenticate the request; the reason is logged.
    Skip(&'static str),
}

/// A single authentication mechanism.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Try to authenticate `request`. `Err` is reserved for infrastructure
    /// failures that must abort the whole decision.
    async fn attempt(&self, request: &AuthRequest) -> Result<Attempt, AuthError>;

    /// Strategy identifier for logging.
    fn name(&self) -> &str;
}

/// Ordered strategy chain plus optional rate limiting.
pub struct AuthGateway {
    strategies: Vec<Arc<dyn AuthStrategy>>,
    secret_configured: bool,
    limiter: Arc<RateLimiter>,
}

impl AuthGateway {
    /// The standard chain: bearer token → session cookie → shared secret.
    pub fn new(
        codec: Arc<TokenCodec>,
        sessions: SessionStore,
        shared_secret: Option<String>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let shared_secret = shared_secret.filter(|s| !s.is_empty());
        let secret_configured = shared_secret.is_some();
        let mut strategies: Vec<Arc<dyn AuthStrategy>> = vec![
            Arc::new(BearerTokenStrategy::new(codec)),
            Arc::new(SessionCookieStrategy::new(sessions)),
        ];
        if let Some(secret) = shared_secret {
            strategies.push(Arc::new(SharedSecretStrategy::new(secret)));
        }
        Self {
            strategies,
            secret_configured,
            limiter,
        }
    }

    /// A gateway over an explicit strategy list.
    pub fn with_strategies(
        strategies: Vec<Arc<dyn AuthStrategy>>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            strategies,
            secret_configured: true,
            limiter,
        }
    }

    /// The rate limiter shared with the login flow.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run the strategy chain without touching the rate limiter.
    pub async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        if !self.secret_configured {
            error!("no admin shared secret configured");
            return Err(AuthError::Misconfigured(
                "admin shared secret is not configured".into(),
            ));
        }

        for strategy in &self.strategies {
            match strategy.attempt(request).await? {
                Attempt::Matched(identity) => {
                    debug!(
                        strategy = strategy.name(),
                        client_id = %request.client_id,
                        "request authenticated"
                    );
                    return Ok(identity);
                }
                Attempt::Skip(reason) => {
                    debug!(strategy = strategy.name(), reason, "auth strategy skipped");
                }
            }
        }

        Err(AuthError::Unauthenticated)
    }

    /// Rate-limited variant: count the attempt, authenticate, and clear the
    /// client's record on success.
    pub async fn authenticate_rate_limited(
        &self,
        request: &AuthRequest,
    ) -> Result<Identity, AuthError> {
        if self.limiter.is_blocked(&request.client_id) {
            let retry_after_secs = self.limiter.retry_after_secs(&request.client_id);
            warn!(client_id = %request.client_id, retry_after_secs, "auth attempt rate limited");
            return Err(AuthError::RateLimited { retry_after_secs });
        }

        let identity = self.authenticate(request).await?;
        self.limiter.reset(&request.client_id);
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::MemoryKeyValueStore;
    use crate::models::auth::SessionRecord;
    use http::HeaderValue;
    use http::header::AUTHORIZATION;

    const SECRET: &str = "correct horse";

    struct Fixture {
        codec: Arc<TokenCodec>,
        sessions: SessionStore,
        gateway: AuthGateway,
    }

    fn fixture_with_secret(secret: Option<&str>) -> Fixture {
        let codec = Arc::new(TokenCodec::new(b"k", "1h", "30d"));
        let sessions = SessionStore::new(Arc::new(MemoryKeyValueStore::new()));
        let gateway = AuthGateway::new(
            codec.clone(),
            sessions.clone(),
            secret.map(str::to_string),
            Arc::new(RateLimiter::default()),
        );
        Fixture {
            codec,
            sessions,
            gateway,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_secret(Some(SECRET))
    }

    fn request_with_auth(value: &str) -> AuthRequest {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        AuthRequest::new(headers, None, "10.0.0.9")
    }

    #[tokio::test]
    async fn access_token_authenticates() {
        let f = fixture();
        let pair = f.codec.issue("admin").unwrap();
        let identity = f
            .gateway
            .authenticate(&request_with_auth(&format!("Bearer {}", pair.access_token)))
            .await
            .unwrap();
        assert_eq!(identity.method, AuthMethod::BearerToken);
        assert_eq!(identity.subject, "admin");
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_credential() {
        let f = fixture();
        let pair = f.codec.issue("admin").unwrap();
        let err = f
            .gateway
            .authenticate(&request_with_auth(&format!("Bearer {}", pair.refresh_token)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn session_cookie_authenticates() {
        let f = fixture();
        let id = f
            .sessions
            .create(&SessionRecord::admin("10.0.0.1"))
            .await
            .unwrap();
        let identity = f
            .gateway
            .authenticate(&AuthRequest::new(HeaderMap::new(), Some(id), "10.0.0.9"))
            .await
            .unwrap();
        assert_eq!(identity.method, AuthMethod::SessionCookie);
    }

    #[tokio::test]
    async fn non_admin_session_is_rejected() {
        let f = fixture();
        let mut record = SessionRecord::admin("10.0.0.1");
        record.is_admin = false;
        let id = f.sessions.create(&record).await.unwrap();
        let err = f
            .gateway
            .authenticate(&AuthRequest::new(HeaderMap::new(), Some(id), "10.0.0.9"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn shared_secret_via_bearer_header_falls_through() {
        let f = fixture();
        let identity = f
            .gateway
            .authenticate(&request_with_auth(&format!("Bearer {SECRET}")))
            .await
            .unwrap();
        assert_eq!(identity.method, AuthMethod::SharedSecret);
    }

    #[tokio::test]
    async fn shared_secret_via_raw_and_legacy_headers() {
        let f = fixture();
        let identity = f.gateway.authenticate(&request_with_auth(SECRET)).await.unwrap();
        assert_eq!(identity.method, AuthMethod::SharedSecret);

        let mut headers = HeaderMap::new();
        headers.insert("x-admin-password", HeaderValue::from_static(SECRET));
        let identity = f
            .gateway
            .authenticate(&AuthRequest::new(headers, None, "10.0.0.9"))
            .await
            .unwrap();
        assert_eq!(identity.method, AuthMethod::SharedSecret);
    }

    #[tokio::test]
    async fn wrong_secret_is_unauthenticated() {
        let f = fixture();
        let err = f
            .gateway
            .authenticate(&request_with_auth("Bearer nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn missing_secret_is_misconfigured() {
        let f = fixture_with_secret(None);
        let pair = f.codec.issue("admin").unwrap();
        let err = f
            .gateway
            .authenticate(&request_with_auth(&format!("Bearer {}", pair.access_token)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Misconfigured(_)));
    }

    #[tokio::test]
    async fn rate_limited_variant_blocks_and_resets() {
        let f = fixture();
        let bad = request_with_auth("Bearer wrong");
        for _ in 0..5 {
            assert!(matches!(
                f.gateway.authenticate_rate_limited(&bad).await,
                Err(AuthError::Unauthenticated)
            ));
        }
        assert!(matches!(
            f.gateway.authenticate_rate_limited(&bad).await,
            Err(AuthError::RateLimited { .. })
        ));

        f.gateway.limiter().reset(&bad.client_id);
        let good = request_with_auth(&format!("Bearer {SECRET}"));
        assert!(f.gateway.authenticate_rate_limited(&good).await.is_ok());
        // Success cleared the window.
        assert!(!f.gateway.limiter().is_blocked(&good.client_id));
    }

    fn peer() -> Option<IpAddr> {
        Some(IpAddr::from([203, 0, 113, 7]))
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers.insert("x-real-ip", HeaderValue::from_static("2.2.2.2"));
        headers
    }

    #[test]
    fn client_id_ignores_forwarding_headers_by_default() {
        let id = resolve_client_id(peer(), &forwarded("1.1.1.1"), ClientIdSource::PeerAddress);
        assert_eq!(id.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn client_id_without_any_address_is_none() {
        assert_eq!(
            resolve_client_id(None, &forwarded("1.1.1.1"), ClientIdSource::PeerAddress),
            None
        );
        assert_eq!(
            resolve_client_id(None, &HeaderMap::new(), ClientIdSource::TrustedProxy),
            None
        );
    }

    #[test]
    fn trusted_proxy_reports_the_last_forwarded_hop() {
        let id = resolve_client_id(
            peer(),
            &forwarded("6.6.6.6, 1.1.1.1"),
            ClientIdSource::TrustedProxy,
        );
        assert_eq!(id.as_deref(), Some("1.1.1.1"));
    }

    #[test]
    fn trusted_proxy_skips_unparseable_values() {
        let id = resolve_client_id(peer(), &forwarded("not-an-ip"), ClientIdSource::TrustedProxy);
        assert_eq!(id.as_deref(), Some("2.2.2.2"));

        let id = resolve_client_id(peer(), &HeaderMap::new(), ClientIdSource::TrustedProxy);
        assert_eq!(id.as_deref(), Some("203.0.113.7"));
    }

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl AuthStrategy for Fixed {
        async fn attempt(&self, _request: &AuthRequest) -> Result<Attempt, AuthError> {
            Ok(match self.0 {
                Some(subject) => Attempt::Matched(Identity {
                    subject: subject.to_string(),
                    method: AuthMethod::SharedSecret,
                }),
                None => Attempt::Skip("fixed skip"),
            })
        }

        fn name(&self) -> &str {
            "Fixed"
        }
    }

    #[tokio::test]
    async fn first_matching_strategy_wins() {
        let gateway = AuthGateway::with_strategies(
            vec![
                Arc::new(Fixed(None)),
                Arc::new(Fixed(Some("first"))),
                Arc::new(Fixed(Some("second"))),
            ],
            Arc::new(RateLimiter::default()),
        );
        let identity = gateway.authenticate(&AuthRequest::default()).await.unwrap();
        assert_eq!(identity.subject, "first");
    }
}
