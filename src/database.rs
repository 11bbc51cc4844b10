//! PostgreSQL connection pool
//!
//! Only compiled with the `postgres` feature. The pool is built from
//! [`DatabaseConfig`], checked with a `SELECT 1` round trip and, unless
//! disabled, migrated to the schema in `migrations/`.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::parse::parse_duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL (`DATABASE_URL`)
    pub database_url: String,

    pub max_connections: u32,

    pub min_connections: u32,

    /// Maximum wait for a pooled connection
    pub acquire_timeout: Duration,

    /// Connections older than this are recycled
    pub max_lifetime: Duration,

    pub idle_timeout: Duration,

    pub ssl_mode: SslMode,

    /// CA certificate for verify-ca/verify-full
    pub ssl_root_cert: Option<String>,

    /// Apply `migrations/` after connecting
    pub auto_migrate: bool,
}

/// SSL/TLS mode for database connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Development only
    Disable,
    Prefer,
    #[default]
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "disable" => Some(Self::Disable),
            "prefer" => Some(Self::Prefer),
            "require" => Some(Self::Require),
            "verify-ca" | "verifyca" => Some(Self::VerifyCa),
            "verify-full" | "verifyfull" => Some(Self::VerifyFull),
            _ => None,
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
            ssl_mode: SslMode::default(),
            ssl_root_cert: None,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Load configuration from environment variables.
    ///
    /// - `DATABASE_URL` (required)
    /// - `DB_MAX_CONNECTIONS` (default 10), `DB_MIN_CONNECTIONS` (default 1)
    /// - `DB_ACQUIRE_TIMEOUT` (default "30s"), `DB_MAX_LIFETIME` ("30m"),
    ///   `DB_IDLE_TIMEOUT` ("10m")
    /// - `DB_SSL_MODE`: disable|prefer|require|verify-ca|verify-full
    /// - `DB_SSL_ROOT_CERT`
    /// - `DB_AUTO_MIGRATE` (default true)
    pub fn from_env() -> Result<Self, DatabaseError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::Configuration("DATABASE_URL is not set".into()))?;

        let defaults = Self::default();

        let ssl_mode = match std::env::var("DB_SSL_MODE") {
            Ok(s) => SslMode::parse(&s).ok_or_else(|| {
                DatabaseError::Configuration(format!("Unknown DB_SSL_MODE: {}", s))
            })?,
            Err(_) => defaults.ssl_mode,
        };

        Ok(Self {
            database_url,
            max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            min_connections: env_parse("DB_MIN_CONNECTIONS").unwrap_or(defaults.min_connections),
            acquire_timeout: env_duration("DB_ACQUIRE_TIMEOUT").unwrap_or(defaults.acquire_timeout),
            max_lifetime: env_duration("DB_MAX_LIFETIME").unwrap_or(defaults.max_lifetime),
            idle_timeout: env_duration("DB_IDLE_TIMEOUT").unwrap_or(defaults.idle_timeout),
            ssl_mode,
            ssl_root_cert: std::env::var("DB_SSL_ROOT_CERT").ok(),
            auto_migrate: std::env::var("DB_AUTO_MIGRATE")
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(true),
        })
    }

    pub fn builder(database_url: impl Into<String>) -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new(database_url)
    }

    pub fn requires_ssl(&self) -> bool {
        !matches!(self.ssl_mode, SslMode::Disable | SslMode::Prefer)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_duration(key: &str) -> Option<Duration> {
    std::env::var(key).ok().and_then(|s| parse_duration(&s))
}

/// Builder for DatabaseConfig
#[derive(Debug, Clone)]
pub struct DatabaseConfigBuilder {
    config: DatabaseConfig,
}

impl DatabaseConfigBuilder {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            config: DatabaseConfig {
                database_url: database_url.into(),
                ..Default::default()
            },
        }
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.config.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.config.min_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.config.ssl_mode = mode;
        self
    }

    pub fn without_auto_migrate(mut self) -> Self {
        self.config.auto_migrate = false;
        self
    }

    pub fn build(self) -> DatabaseConfig {
        self.config
    }
}

/// Connect, health-check and (optionally) migrate
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        ssl_mode = ?config.ssl_mode,
        auto_migrate = config.auto_migrate,
        "Initializing database connection pool"
    );

    let mut connect_options = PgConnectOptions::from_str(&config.database_url)
        .map_err(|e| DatabaseError::Configuration(format!("Invalid DATABASE_URL: {}", e)))?
        .ssl_mode(config.ssl_mode.into());

    if let Some(ref root_cert) = config.ssl_root_cert {
        connect_options = connect_options.ssl_root_cert(root_cert);
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .test_before_acquire(true)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    health_check(&pool).await?;

    if config.auto_migrate {
        run_migrations(&pool).await?;
    }

    Ok(pool)
}

/// Apply the embedded `migrations/` directory
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    info!("Database migrations applied");
    Ok(())
}

/// Round-trip a trivial query and report pool state
pub async fn health_check(pool: &PgPool) -> Result<HealthStatus, DatabaseError> {
    let start = std::time::Instant::now();

    let (one,): (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DatabaseError::HealthCheck(e.to_string()))?;

    if one != 1 {
        return Err(DatabaseError::HealthCheck("Unexpected query result".into()));
    }

    let (ssl_enabled,): (bool,) = sqlx::query_as(
        "SELECT COALESCE((SELECT ssl FROM pg_stat_ssl WHERE pid = pg_backend_pid()), false)",
    )
    .fetch_one(pool)
    .await
    .unwrap_or((false,));

    let status = HealthStatus {
        ssl_enabled,
        latency: start.elapsed(),
        pool_size: pool.size(),
        idle_connections: pool.num_idle() as u32,
    };

    if status.ssl_enabled {
        info!(latency_ms = status.latency.as_millis() as u64, "Database health check passed");
    } else {
        warn!(
            latency_ms = status.latency.as_millis() as u64,
            "Database health check passed (SSL NOT enabled)"
        );
    }

    Ok(status)
}

/// Database health status
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub ssl_enabled: bool,
    pub latency: Duration,
    pub pool_size: u32,
    pub idle_connections: u32,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.latency < Duration::from_secs(5)
    }
}

/// Database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database configuration error: {0}")]
    Configuration(String),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database health check failed: {0}")]
    HealthCheck(String),

    #[error("Database migration error: {0}")]
    Migration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_require_ssl() {
        let config = DatabaseConfig::default();
        assert_eq!(config.ssl_mode, SslMode::Require);
        assert_eq!(SslMode::default(), config.ssl_mode);
        assert!(config.requires_ssl());
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_builder() {
        let config = DatabaseConfig::builder("postgres://localhost/mvp")
            .max_connections(4)
            .ssl_mode(SslMode::Disable)
            .without_auto_migrate()
            .build();
        assert_eq!(config.database_url, "postgres://localhost/mvp");
        assert_eq!(config.max_connections, 4);
        assert!(!config.requires_ssl());
        assert!(!config.auto_migrate);
    }

    #[test]
    fn test_ssl_mode_parse() {
        assert_eq!(SslMode::parse("verify-full"), Some(SslMode::VerifyFull));
        assert_eq!(SslMode::parse("PREFER"), Some(SslMode::Prefer));
        assert_eq!(SslMode::parse("sometimes"), None);
    }
}
