//! Service configuration
//!
//! [`ServiceConfig`] carries everything the router needs: bind address,
//! token settings, the identity claims stamped on tokens, the route prefix
//! and the HTTP [`SecurityConfig`]. It is loaded once at startup, either
//! from the environment or with the builder.
//!
//! # Example
//!
//! ```ignore
//! use multibpo_mvp::config::ServiceConfig;
//!
//! // From MVP_*, JWT_SECRET, REQUEST_TIMEOUT, ...
//! let config = ServiceConfig::from_env()?;
//!
//! // Or programmatically
//! let config = ServiceConfig::builder("a-secret-of-at-least-32-characters!!")
//!     .access_token_lifetime(Duration::from_secs(600))
//!     .path_prefix("/api/mvp")
//!     .build()?;
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::parse::{parse_duration, parse_size};
use crate::token::{IdentityClaims, TokenIssuer};

/// Minimum accepted length of `JWT_SECRET`
pub const MIN_SECRET_LEN: usize = 32;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("JWT_SECRET must be at least {min} characters (got {actual})")]
    WeakSecret { min: usize, actual: usize },

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

// ============================================================================
// HTTP security layers
// ============================================================================

/// Settings for the security layers applied by
/// [`SecureRouter`](crate::layers::SecureRouter)
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,

    pub request_timeout: Duration,

    /// Empty = same-origin only, `["*"]` = any origin, else an allowlist
    pub cors_origins: Vec<String>,

    pub security_headers_enabled: bool,

    /// tower-http request/response tracing
    pub tracing_enabled: bool,

    /// Per-request audit logging
    pub audit_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
            security_headers_enabled: true,
            tracing_enabled: true,
            audit_enabled: true,
        }
    }
}

impl SecurityConfig {
    pub fn cors_is_permissive(&self) -> bool {
        self.cors_origins.len() == 1 && self.cors_origins[0] == "*"
    }

    pub fn cors_is_restrictive(&self) -> bool {
        self.cors_origins.is_empty()
    }

    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_request_size = match lookup("MAX_REQUEST_SIZE") {
            Some(s) => parse_size(&s).ok_or(ConfigError::Invalid {
                key: "MAX_REQUEST_SIZE",
                value: s,
            })?,
            None => defaults.max_request_size,
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT") {
            Some(s) => parse_duration(&s).ok_or(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT",
                value: s,
            })?,
            None => defaults.request_timeout,
        };

        let cors_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            max_request_size,
            request_timeout,
            cors_origins,
            security_headers_enabled: flag(
                "SECURITY_HEADERS_ENABLED",
                lookup("SECURITY_HEADERS_ENABLED"),
                true,
            )?,
            tracing_enabled: flag("TRACING_ENABLED", lookup("TRACING_ENABLED"), true)?,
            audit_enabled: flag("AUDIT_ENABLED", lookup("AUDIT_ENABLED"), true)?,
        })
    }
}

/// Boolean switch: true/false, 1/0, yes/no, on/off
fn flag(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

// ============================================================================
// Service configuration
// ============================================================================

/// Top-level service configuration
#[derive(Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,

    /// HS256 signing secret
    pub jwt_secret: String,

    pub access_token_lifetime: Duration,

    pub refresh_token_lifetime: Duration,

    /// `sistema`, `versao` and `tipo_conta` claim values
    pub identity: IdentityClaims,

    /// Mount point of the MVP routes, e.g. "/mvp". Empty mounts at root.
    pub path_prefix: String,

    pub security: SecurityConfig,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"[REDACTED]")
            .field("access_token_lifetime", &self.access_token_lifetime)
            .field("refresh_token_lifetime", &self.refresh_token_lifetime)
            .field("identity", &self.identity)
            .field("path_prefix", &self.path_prefix)
            .field("security", &self.security)
            .finish()
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `JWT_SECRET` (required, at least 32 characters)
    /// - `MVP_BIND_ADDR` (default "0.0.0.0:8000")
    /// - `ACCESS_TOKEN_LIFETIME` (default "5m"), `REFRESH_TOKEN_LIFETIME` (default "1d")
    /// - `MVP_SYSTEM_NAME` ("MultiBPO MVP"), `MVP_VERSION` ("1.0"), `MVP_ACCOUNT_KIND` ("mvp")
    /// - `MVP_PATH_PREFIX` (default "/mvp")
    /// - `MAX_REQUEST_SIZE` ("1MB"), `REQUEST_TIMEOUT` ("30s")
    /// - `CORS_ALLOWED_ORIGINS` (comma-separated, or "*")
    /// - `SECURITY_HEADERS_ENABLED`, `TRACING_ENABLED`, `AUDIT_ENABLED` (default true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let mut builder = Self::builder(secret);

        if let Some(addr) = lookup("MVP_BIND_ADDR") {
            builder.config.bind_addr = addr.parse().map_err(|_| ConfigError::Invalid {
                key: "MVP_BIND_ADDR",
                value: addr,
            })?;
        }
        if let Some(s) = lookup("ACCESS_TOKEN_LIFETIME") {
            builder.config.access_token_lifetime = lifetime("ACCESS_TOKEN_LIFETIME", s)?;
        }
        if let Some(s) = lookup("REFRESH_TOKEN_LIFETIME") {
            builder.config.refresh_token_lifetime = lifetime("REFRESH_TOKEN_LIFETIME", s)?;
        }
        if let Some(name) = lookup("MVP_SYSTEM_NAME") {
            builder.config.identity.system_name = name;
        }
        if let Some(version) = lookup("MVP_VERSION") {
            builder.config.identity.version = version;
        }
        if let Some(kind) = lookup("MVP_ACCOUNT_KIND") {
            builder.config.identity.account_kind = kind;
        }
        if let Some(prefix) = lookup("MVP_PATH_PREFIX") {
            builder = builder.path_prefix(prefix);
        }
        builder.config.security = SecurityConfig::from_lookup(&lookup)?;

        builder.build()
    }

    pub fn builder(jwt_secret: impl Into<String>) -> ServiceConfigBuilder {
        ServiceConfigBuilder::new(jwt_secret)
    }

    pub fn token_issuer(&self) -> TokenIssuer {
        TokenIssuer::new(
            &self.jwt_secret,
            self.access_token_lifetime,
            self.refresh_token_lifetime,
            self.identity.clone(),
        )
    }
}

fn lifetime(key: &'static str, value: String) -> Result<Duration, ConfigError> {
    match parse_duration(&value) {
        Some(d) if !d.is_zero() => Ok(d),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

/// Normalize to "" or "/segment" without a trailing slash
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Builder for ServiceConfig
#[derive(Debug, Clone)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            config: ServiceConfig {
                bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
                jwt_secret: jwt_secret.into(),
                access_token_lifetime: Duration::from_secs(5 * 60),
                refresh_token_lifetime: Duration::from_secs(24 * 60 * 60),
                identity: IdentityClaims::default(),
                path_prefix: "/mvp".to_string(),
                security: SecurityConfig::default(),
            },
        }
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.access_token_lifetime = lifetime;
        self
    }

    pub fn refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.refresh_token_lifetime = lifetime;
        self
    }

    pub fn identity(mut self, identity: IdentityClaims) -> Self {
        self.config.identity = identity;
        self
    }

    pub fn path_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.config.path_prefix = normalize_prefix(prefix.as_ref());
        self
    }

    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<ServiceConfig, ConfigError> {
        let len = self.config.jwt_secret.chars().count();
        if len < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                min: MIN_SECRET_LEN,
                actual: len,
            });
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[("JWT_SECRET", SECRET)])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.access_token_lifetime, Duration::from_secs(300));
        assert_eq!(config.refresh_token_lifetime, Duration::from_secs(86_400));
        assert_eq!(config.identity, IdentityClaims::default());
        assert_eq!(config.path_prefix, "/mvp");
        assert_eq!(config.security.max_request_size, 1024 * 1024);
        assert!(config.security.cors_is_restrictive());
    }

    #[test]
    fn test_missing_and_weak_secret() {
        assert_eq!(
            ServiceConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
        assert_eq!(
            ServiceConfig::from_lookup(lookup(&[("JWT_SECRET", "short")])).unwrap_err(),
            ConfigError::WeakSecret { min: 32, actual: 5 }
        );
    }

    #[test]
    fn test_flags_accept_common_spellings() {
        for (value, expected) in [
            ("true", true),
            ("1", true),
            ("YES", true),
            ("on", true),
            ("false", false),
            ("0", false),
            ("no", false),
            (" Off ", false),
        ] {
            let config = ServiceConfig::from_lookup(lookup(&[
                ("JWT_SECRET", SECRET),
                ("AUDIT_ENABLED", value),
            ]))
            .unwrap();
            assert_eq!(config.security.audit_enabled, expected, "{}", value);
        }
    }

    #[test]
    fn test_unrecognized_flag_is_an_error() {
        assert_eq!(
            ServiceConfig::from_lookup(lookup(&[
                ("JWT_SECRET", SECRET),
                ("TRACING_ENABLED", "flase"),
            ]))
            .unwrap_err(),
            ConfigError::Invalid {
                key: "TRACING_ENABLED",
                value: "flase".to_string(),
            }
        );
        assert!(ServiceConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("SECURITY_HEADERS_ENABLED", ""),
        ]))
        .is_err());
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("MVP_BIND_ADDR", "127.0.0.1:9000"),
            ("ACCESS_TOKEN_LIFETIME", "15m"),
            ("REFRESH_TOKEN_LIFETIME", "7d"),
            ("MVP_SYSTEM_NAME", "MultiBPO Teste"),
            ("MVP_PATH_PREFIX", "api/mvp/"),
            ("MAX_REQUEST_SIZE", "64KB"),
            ("CORS_ALLOWED_ORIGINS", "https://app.multibpo.com.br, https://mvp.multibpo.com.br"),
            ("SECURITY_HEADERS_ENABLED", "false"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.access_token_lifetime, Duration::from_secs(900));
        assert_eq!(config.refresh_token_lifetime, Duration::from_secs(7 * 86_400));
        assert_eq!(config.identity.system_name, "MultiBPO Teste");
        assert_eq!(config.identity.version, "1.0");
        assert_eq!(config.path_prefix, "/api/mvp");
        assert_eq!(config.security.max_request_size, 64 * 1024);
        assert_eq!(config.security.cors_origins.len(), 2);
        assert!(!config.security.security_headers_enabled);
        assert!(config.security.tracing_enabled);
    }

    #[test]
    fn test_invalid_values() {
        let err = ServiceConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("REQUEST_TIMEOUT", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "REQUEST_TIMEOUT", .. }));

        let err = ServiceConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("ACCESS_TOKEN_LIFETIME", "0s"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ACCESS_TOKEN_LIFETIME", .. }));
    }

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(normalize_prefix("/mvp/"), "/mvp");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ServiceConfig::builder(SECRET).build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_permissive_cors() {
        let security = SecurityConfig {
            cors_origins: vec!["*".into()],
            ..Default::default()
        };
        assert!(security.cors_is_permissive());
    }
}
