//! API server configuration.

use std::fmt;

use snipbox_core::auth::ClientIdSource;
use snipbox_core::auth::csrf::{CsrfConfig, DEFAULT_PRODUCTION_ORIGIN};
use snipbox_core::auth::token::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL, resolve_jwt_secret};
use snipbox_core::sanitize::ScriptPolicy;
use tracing::warn;

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL. `None` selects the in-memory backends.
    pub database_url: Option<String>,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Access-token lifetime as a duration string (`15m`, `1h`, ...).
    pub access_ttl: String,
    /// Refresh-token lifetime as a duration string.
    pub refresh_ttl: String,
    /// Admin password, also accepted as a legacy shared secret.
    pub admin_password: Option<String>,
    /// Loopback origins, lower CSRF threshold, non-secure cookies.
    pub dev_mode: bool,
    /// Production origin allowed by CSRF and CORS.
    pub allowed_origin: String,
    /// Script sanitization policy for component writes.
    pub script_policy: ScriptPolicy,
    /// Take the client address from reverse-proxy headers. Only safe when
    /// every request arrives through a proxy that overwrites them.
    pub trust_proxy_headers: bool,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("jwt_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .field("dev_mode", &self.dev_mode)
            .field("allowed_origin", &self.allowed_origin)
            .field("script_policy", &self.script_policy)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable           | Default                                     |
    /// |--------------------|---------------------------------------------|
    /// | `BIND_ADDR`        | `127.0.0.1:3100`                            |
    /// | `DATABASE_URL`     | unset (in-memory backends)                  |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file     |
    /// | `JWT_ACCESS_TTL`   | `1h`                                        |
    /// | `JWT_REFRESH_TTL`  | `30d`                                       |
    /// | `ADMIN_PASSWORD`   | unset (admin auth reports misconfigured)    |
    /// | `SNIPBOX_DEV_MODE` | `false`                                     |
    /// | `ALLOWED_ORIGIN`   | `https://component-management.vercel.app`   |
    /// | `SCRIPT_SANITIZER` | `relaxed`                                   |
    /// | `TRUST_PROXY_HEADERS` | `false`                                  |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), resolve_jwt_secret)
    }

    /// Build a config from an arbitrary variable lookup. `secret` is only
    /// called when neither `JWT_SECRET` nor `AUTH_SECRET` is set.
    pub fn from_lookup(
        var: impl Fn(&str) -> Option<String>,
        secret: impl FnOnce() -> String,
    ) -> Self {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET")
            .or_else(|| var("AUTH_SECRET"))
            .unwrap_or_else(secret);

        let script_policy = match var("SCRIPT_SANITIZER") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{e}, falling back to relaxed");
                ScriptPolicy::Relaxed
            }),
            None => ScriptPolicy::default(),
        };

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3100".into()),
            database_url: var("DATABASE_URL"),
            jwt_secret,
            access_ttl: var("JWT_ACCESS_TTL").unwrap_or_else(|| DEFAULT_ACCESS_TTL.into()),
            refresh_ttl: var("JWT_REFRESH_TTL").unwrap_or_else(|| DEFAULT_REFRESH_TTL.into()),
            admin_password: var("ADMIN_PASSWORD"),
            dev_mode: var("SNIPBOX_DEV_MODE").is_some_and(|v| parse_flag(&v)),
            allowed_origin: var("ALLOWED_ORIGIN")
                .unwrap_or_else(|| DEFAULT_PRODUCTION_ORIGIN.into()),
            script_policy,
            trust_proxy_headers: var("TRUST_PROXY_HEADERS").is_some_and(|v| parse_flag(&v)),
        }
    }

    /// Where rate-limit client identifiers come from.
    pub fn client_id_source(&self) -> ClientIdSource {
        if self.trust_proxy_headers {
            ClientIdSource::TrustedProxy
        } else {
            ClientIdSource::PeerAddress
        }
    }

    /// CSRF guard settings derived from this config.
    pub fn csrf(&self) -> CsrfConfig {
        CsrfConfig {
            production_origin: self.allowed_origin.clone(),
            dev_mode: self.dev_mode,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ApiConfig::from_lookup(lookup(&[]), || "generated".into());
        assert_eq!(config.bind_addr, "127.0.0.1:3100");
        assert_eq!(config.database_url, None);
        assert_eq!(config.jwt_secret, "generated");
        assert_eq!(config.access_ttl, "1h");
        assert_eq!(config.refresh_ttl, "30d");
        assert_eq!(config.admin_password, None);
        assert!(!config.dev_mode);
        assert_eq!(config.allowed_origin, DEFAULT_PRODUCTION_ORIGIN);
        assert_eq!(config.script_policy, ScriptPolicy::Relaxed);
        assert!(!config.trust_proxy_headers);
        assert_eq!(config.client_id_source(), ClientIdSource::PeerAddress);
    }

    #[test]
    fn proxy_headers_are_trusted_only_when_enabled() {
        let config =
            ApiConfig::from_lookup(lookup(&[("TRUST_PROXY_HEADERS", "yes")]), || "s".into());
        assert_eq!(config.client_id_source(), ClientIdSource::TrustedProxy);
    }

    #[test]
    fn jwt_secret_prefers_jwt_over_auth_secret() {
        let config = ApiConfig::from_lookup(
            lookup(&[("JWT_SECRET", "a"), ("AUTH_SECRET", "b")]),
            || unreachable!("secret file must not be consulted"),
        );
        assert_eq!(config.jwt_secret, "a");

        let config = ApiConfig::from_lookup(lookup(&[("AUTH_SECRET", "b")]), || "c".into());
        assert_eq!(config.jwt_secret, "b");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ApiConfig::from_lookup(
            lookup(&[("ADMIN_PASSWORD", "  "), ("DATABASE_URL", "")]),
            || "s".into(),
        );
        assert_eq!(config.admin_password, None);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn dev_mode_and_policy_parse() {
        let config = ApiConfig::from_lookup(
            lookup(&[("SNIPBOX_DEV_MODE", "TRUE"), ("SCRIPT_SANITIZER", "paranoid")]),
            || "s".into(),
        );
        assert!(config.dev_mode);
        assert_eq!(config.script_policy, ScriptPolicy::Paranoid);
        assert!(config.csrf().dev_mode);
    }

    #[test]
    fn unknown_policy_falls_back_to_relaxed() {
        let config =
            ApiConfig::from_lookup(lookup(&[("SCRIPT_SANITIZER", "strict")]), || "s".into());
        assert_eq!(config.script_policy, ScriptPolicy::Relaxed);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = ApiConfig::from_lookup(
            lookup(&[("JWT_SECRET", "topsecret"), ("ADMIN_PASSWORD", "hunter2")]),
            || "s".into(),
        );
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("topsecret"));
        assert!(!rendered.contains("hunter2"));
    }
}
