//! Secure error handling
//!
//! Every handler returns [`AppError`] on failure. The response body always
//! has the same envelope:
//!
//! ```text
//! {"success": false, "message": "...", "error_code": "VALIDATION_ERROR",
//!  "errors": {"email": ["Já existe uma conta com este email."]}}
//! ```
//!
//! Validation errors carry a field → messages map and are always 400.
//! Internal errors are logged with their source and rendered as an opaque
//! 500; the source is only echoed back when [`ErrorConfig::expose_details`]
//! is on (development).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::validation::FieldErrors;

/// Error code for field-level validation failures
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Error code for missing or rejected credentials
pub const AUTH_ERROR: &str = "AUTH_ERROR";
/// Error code for an account that has no MVP profile
pub const PROFILE_NOT_FOUND: &str = "PROFILE_NOT_FOUND";
/// Error code for a logout request without a refresh token
pub const MISSING_REFRESH_TOKEN: &str = "MISSING_REFRESH_TOKEN";
/// Error code for unexpected failures
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

// ============================================================================
// Error Configuration
// ============================================================================

/// Error rendering configuration
#[derive(Debug, Clone)]
pub struct ErrorConfig {
    /// Echo internal details in responses. Must be `false` in production.
    pub expose_details: bool,

    /// Log errors as they are rendered
    pub log_errors: bool,

    /// Message shown in place of internal failures
    pub internal_error_message: String,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl ErrorConfig {
    pub fn production() -> Self {
        Self {
            expose_details: false,
            log_errors: true,
            internal_error_message: "Erro interno no servidor. Tente novamente.".to_string(),
        }
    }

    pub fn development() -> Self {
        Self {
            expose_details: true,
            ..Self::production()
        }
    }

    /// Load from environment
    ///
    /// `RUST_ENV` or `APP_ENV` set to "production"/"prod" selects the
    /// production config; anything else selects development.
    pub fn from_env() -> Self {
        let env = std::env::var("RUST_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        match env.to_lowercase().as_str() {
            "production" | "prod" => Self::production(),
            _ => Self::development(),
        }
    }
}

static ERROR_CONFIG: std::sync::OnceLock<ErrorConfig> = std::sync::OnceLock::new();

/// Install the error configuration. Only the first call has an effect.
pub fn init(config: ErrorConfig) {
    let _ = ERROR_CONFIG.set(config);
}

/// Current error configuration (production defaults if never initialized)
pub fn config() -> &'static ErrorConfig {
    ERROR_CONFIG.get_or_init(ErrorConfig::default)
}

// ============================================================================
// Error Types
// ============================================================================

/// Error categories and their HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 400 - user-fixable input problem
    Validation,
    /// 401 - missing, invalid or expired credentials
    Unauthorized,
    /// 404 - resource does not exist
    NotFound,
    /// 500 - unexpected failure, details hidden
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_code(&self) -> &'static str {
        match self {
            Self::Validation => VALIDATION_ERROR,
            Self::Unauthorized => AUTH_ERROR,
            Self::NotFound => PROFILE_NOT_FOUND,
            Self::Internal => INTERNAL_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation_error"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not_found"),
            Self::Internal => write!(f, "internal_error"),
        }
    }
}

/// Application error rendered as a JSON envelope
#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    /// User-facing message
    pub message: String,
    /// Machine-readable code (`VALIDATION_ERROR`, `AUTH_ERROR`, ...)
    pub error_code: &'static str,
    /// Field name → messages, for validation failures
    pub field_errors: Option<FieldErrors>,
    /// Internal details (logged, only exposed in development)
    pub details: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            error_code: kind.default_code(),
            field_errors: None,
            details: None,
            source: None,
        }
    }

    /// 400 carrying per-field messages
    pub fn validation(message: impl Into<String>, errors: FieldErrors) -> Self {
        let mut err = Self::new(ErrorKind::Validation, message);
        err.field_errors = Some(errors);
        err
    }

    /// 400 without field detail
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// 500 with a logged source
    pub fn internal(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            details: Some(source.to_string()),
            source: Some(Box::new(source)),
            ..Self::new(ErrorKind::Internal, message)
        }
    }

    pub fn internal_msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.error_code = code;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn log(&self) {
        if !config().log_errors {
            return;
        }

        let details = self.details.as_deref().unwrap_or("none");

        match self.kind {
            ErrorKind::Internal => {
                tracing::error!(
                    error_kind = %self.kind,
                    error_code = self.error_code,
                    message = %self.message,
                    details = %details,
                    "Internal error"
                );
            }
            ErrorKind::Unauthorized => {
                tracing::warn!(
                    error_kind = %self.kind,
                    message = %self.message,
                    "Auth error"
                );
            }
            _ => {
                tracing::debug!(
                    error_kind = %self.kind,
                    error_code = self.error_code,
                    errors = ?self.field_errors,
                    "Client error"
                );
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// JSON error envelope
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let cfg = config();
        let status = self.kind.status_code();

        let message = match self.kind {
            ErrorKind::Internal if !cfg.expose_details => cfg.internal_error_message.clone(),
            _ => self.message,
        };

        let body = ErrorResponse {
            success: false,
            message,
            error_code: self.error_code,
            errors: self.field_errors,
            details: if cfg.expose_details { self.details } else { None },
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<crate::store::StoreError> for AppError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::NotFound(what) => {
                AppError::not_found("Registro não encontrado.").with_details(what)
            }
            err => AppError::internal("Identity store failure", err),
        }
    }
}

impl From<crate::password::PasswordError> for AppError {
    fn from(err: crate::password::PasswordError) -> Self {
        AppError::internal("Password hashing failure", err)
    }
}

/// Result alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
