//! MultiBPO MVP identity server
//!
//! Configuration comes from the environment; see `.env.example`. With the
//! `postgres` feature and `DATABASE_URL` set, accounts persist to
//! PostgreSQL. Otherwise the server runs on the in-memory store.

use std::sync::Arc;

use anyhow::Context;
use multibpo_mvp::observability::{self, ObservabilityConfig, SecurityEvent};
use multibpo_mvp::{build_router, error, security_event, AppState, ErrorConfig, IdentityStore, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init(&ObservabilityConfig::from_env()).context("failed to initialize logging")?;
    error::init(ErrorConfig::from_env());

    let config = ServiceConfig::from_env().context("invalid service configuration")?;
    tracing::info!(config = ?config, "Configuration loaded");

    let store = open_store().await?;
    let addr = config.bind_addr;
    let prefix = config.path_prefix.clone();
    let app = build_router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    security_event!(
        SecurityEvent::SystemStartup,
        addr = %addr,
        prefix = %prefix,
        "MultiBPO MVP server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    security_event!(SecurityEvent::SystemShutdown, "MultiBPO MVP server stopped");
    Ok(())
}

#[cfg(feature = "postgres")]
async fn open_store() -> anyhow::Result<Arc<dyn IdentityStore>> {
    use multibpo_mvp::{create_pool, DatabaseConfig, MemoryStore, PgIdentityStore};

    if std::env::var("DATABASE_URL").is_err() {
        tracing::warn!("DATABASE_URL not set, using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db_config = DatabaseConfig::from_env()?;
    let pool = create_pool(&db_config).await?;
    security_event!(
        SecurityEvent::DatabaseConnected,
        max_connections = db_config.max_connections,
        "Connected to PostgreSQL"
    );

    Ok(Arc::new(PgIdentityStore::new(pool)))
}

#[cfg(not(feature = "postgres"))]
async fn open_store() -> anyhow::Result<Arc<dyn IdentityStore>> {
    tracing::warn!("Built without the postgres feature, using in-memory store");
    Ok(Arc::new(multibpo_mvp::MemoryStore::new()))
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
