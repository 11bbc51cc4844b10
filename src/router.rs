//! Route table and shared state

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::accounts::AccountService;
use crate::config::ServiceConfig;
use crate::handlers;
use crate::layers::SecureRouter;
use crate::store::IdentityStore;
use crate::token::TokenIssuer;

/// MVP endpoints relative to the configured prefix
pub const ENDPOINTS: [(&str, &str); 6] = [
    ("POST", "/register/"),
    ("POST", "/login/"),
    ("GET", "/profile/"),
    ("POST", "/logout/"),
    ("GET", "/test/"),
    ("GET", "/protected-test/"),
];

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub tokens: Arc<TokenIssuer>,
    pub accounts: AccountService,
}

impl AppState {
    pub fn new(config: ServiceConfig, store: Arc<dyn IdentityStore>) -> Self {
        Self {
            tokens: Arc::new(config.token_issuer()),
            accounts: AccountService::new(store),
            config: Arc::new(config),
        }
    }
}

/// Build the application router with security layers applied
pub fn build_router(state: AppState) -> Router {
    let mvp = Router::new()
        .route("/register/", post(handlers::register))
        .route("/login/", post(handlers::login))
        .route("/profile/", get(handlers::profile))
        .route("/logout/", post(handlers::logout))
        .route("/test/", get(handlers::status))
        .route("/protected-test/", get(handlers::protected_test));

    let prefix = state.config.path_prefix.clone();
    let security = state.config.security.clone();

    let router = Router::new().route("/health", get(health));
    let router = if prefix.is_empty() {
        router.merge(mvp)
    } else {
        router.nest(&prefix, mvp)
    };

    router.with_state(state).with_security(security)
}

/// Liveness check
async fn health() -> &'static str {
    "OK"
}
