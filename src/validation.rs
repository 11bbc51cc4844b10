//! Input validation
//!
//! Request bodies are validated field by field and every failure is
//! collected into a [`FieldErrors`] map (field name → messages), the shape
//! the MVP frontend renders next to each form input.
//!
//! # Usage
//!
//! ```ignore
//! use multibpo_mvp::validation::{FieldErrors, Validate, validate_required};
//!
//! impl Validate for LoginRequest {
//!     fn validate(&self) -> Result<(), FieldErrors> {
//!         let mut errors = FieldErrors::new();
//!         errors.check(validate_email(self.email.as_deref().unwrap_or_default()));
//!         errors.check(validate_required(self.password.as_deref().unwrap_or_default(), "password"));
//!         errors.into_result()
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

/// Key used for errors that do not belong to a single field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub const MSG_REQUIRED: &str = "Este campo é obrigatório.";
pub const MSG_INVALID_EMAIL: &str = "Insira um endereço de email válido.";

/// Longest email accepted, matching the `accounts.email` column
pub const EMAIL_MAX_LEN: usize = 254;

/// Validation failure for a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub code: ValidationErrorCode,
    pub message: String,
}

impl ValidationError {
    pub fn for_field(
        field: impl Into<String>,
        code: ValidationErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validation error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    Required,
    TooLong,
    InvalidEmail,
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::TooLong => write!(f, "too_long"),
            Self::InvalidEmail => write!(f, "invalid_email"),
        }
    }
}

/// Field name → list of messages
///
/// Ordered by field name so responses are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field shorthand
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn push(&mut self, error: ValidationError) {
        self.add(error.field, error.message);
    }

    /// Record the error of a failed check; returns whether the check passed.
    pub fn check(&mut self, result: Result<(), ValidationError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                self.push(e);
                false
            }
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Types whose fields can be checked for format before any lookup
pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

// ============================================================================
// Field Validators
// ============================================================================

/// Non-blank
pub fn validate_required(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::for_field(
            field,
            ValidationErrorCode::Required,
            MSG_REQUIRED,
        ));
    }
    Ok(())
}

/// At most `max` characters
pub fn validate_max_length(value: &str, max: usize, field: &str) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::for_field(
            field,
            ValidationErrorCode::TooLong,
            format!(
                "Certifique-se de que este campo não tenha mais de {} caracteres.",
                max
            ),
        ));
    }
    Ok(())
}

/// Required, then at most `max` characters
pub fn validate_text(value: &str, max: usize, field: &str) -> Result<(), ValidationError> {
    validate_required(value, field)?;
    validate_max_length(value, max, field)
}

/// Email format, reported on the `email` field
///
/// Pragmatic check: one `@`, a sane local part, a dotted domain. Does not
/// verify deliverability.
pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    validate_required(value, "email")?;

    let invalid =
        || ValidationError::for_field("email", ValidationErrorCode::InvalidEmail, MSG_INVALID_EMAIL);

    let value = value.trim();
    if value.chars().count() > EMAIL_MAX_LEN {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;

    if domain.contains('@') {
        return Err(invalid());
    }
    if local.is_empty() || local.len() > 64 {
        return Err(invalid());
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err(invalid());
    }
    if local.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }
    if domain.is_empty() || domain.len() > 255 || !domain.contains('.') {
        return Err(invalid());
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(invalid());
    }
    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(invalid());
    }

    Ok(())
}

/// Lower-cased, trimmed email as stored and compared
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

// ============================================================================
// JSON Extractor
// ============================================================================

/// JSON body extractor whose rejection is an [`AppError`] envelope.
///
/// Malformed bodies become a 400 with a `non_field_errors` entry instead of
/// axum's plain-text rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                tracing::warn!(error = %rejection, "JSON body rejected");
                Err(AppError::validation(
                    "Dados inválidos.",
                    FieldErrors::single(NON_FIELD_ERRORS, rejection_message(&rejection)),
                ))
            }
        }
    }
}

fn rejection_message(rejection: &JsonRejection) -> &'static str {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Tipo de mídia não suportado. Use application/json."
        }
        _ => "JSON inválido.",
    }
}
