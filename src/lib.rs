//! # MultiBPO MVP identity service
//!
//! Account registration, login and profile retrieval for the MultiBPO MVP
//! tier. A new user registers with name, email, password and CPF; the
//! service validates the CPF checksum, creates the Account and its MVP
//! Profile in one atomic step and returns signed JWT access and refresh
//! tokens carrying the `sistema`/`versao`/`tipo_conta` identity claims.
//!
//! ## Endpoints (under `/mvp` by default)
//!
//! | Method | Path | Auth |
//! |---|---|---|
//! | POST | `/register/` | none |
//! | POST | `/login/` | none |
//! | GET | `/profile/` | bearer |
//! | POST | `/logout/` | bearer |
//! | GET | `/test/` | none |
//! | GET | `/protected-test/` | bearer |
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use multibpo_mvp::{build_router, AppState, MemoryStore, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServiceConfig::from_env()?;
//!     let addr = config.bind_addr;
//!     let app = build_router(AppState::new(config, Arc::new(MemoryStore::new())));
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! With the `postgres` feature, `PgIdentityStore` persists to PostgreSQL
//! through sqlx; the schema lives in `migrations/`.

pub mod accounts;
pub mod audit;
pub mod auth;
pub mod config;
pub mod cpf;
pub mod crypto;
#[cfg(feature = "postgres")]
pub mod database;
pub mod error;
pub mod handlers;
pub mod layers;
pub mod models;
pub mod observability;
pub mod parse;
pub mod password;
pub mod router;
pub mod store;
pub mod token;
pub mod validation;

// Re-exports
pub use accounts::AccountService;
pub use config::{ConfigError, SecurityConfig, ServiceConfig, ServiceConfigBuilder};
pub use cpf::{Cpf, CpfError};
pub use error::{AppError, ErrorConfig, ErrorKind};
pub use layers::SecureRouter;
pub use router::{build_router, AppState};
pub use store::{IdentityStore, MemoryStore, StoreError};
pub use token::{Claims, IdentityClaims, TokenError, TokenIssuer, TokenPair};

#[cfg(feature = "postgres")]
pub use database::{create_pool, health_check, DatabaseConfig, DatabaseError, SslMode};
#[cfg(feature = "postgres")]
pub use store::PgIdentityStore;
