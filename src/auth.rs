//! Bearer authentication
//!
//! [`AuthenticatedAccount`] is an extractor for protected handlers: it reads
//! `Authorization: Bearer <access token>`, verifies the token and loads the
//! Account it names. Refresh tokens, unknown accounts and inactive accounts
//! are all rejected with 401.
//!
//! ```ignore
//! async fn profile(auth: AuthenticatedAccount) -> impl IntoResponse {
//!     format!("Olá, {}", auth.account.full_name())
//! }
//! ```

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};

use crate::error::AppError;
use crate::models::Account;
use crate::observability::SecurityEvent;
use crate::router::AppState;
use crate::security_event;
use crate::token::Claims;

const MSG_MISSING_CREDENTIALS: &str = "As credenciais de autenticação não foram fornecidas.";
const MSG_BAD_HEADER: &str = "Cabeçalho Authorization inválido.";
const MSG_ACCOUNT_NOT_FOUND: &str = "Usuário não encontrado.";
const MSG_ACCOUNT_INACTIVE: &str = "Usuário está inativo.";

/// Account authenticated by a valid access token
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub account: Account,
    pub claims: Claims,
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// `Ok(None)` when the header is absent; an error when it is present but
/// not a bearer credential.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::unauthorized(MSG_BAD_HEADER))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err(AppError::unauthorized(MSG_BAD_HEADER)),
    }
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<AuthenticatedAccount, AppError> {
    let token = bearer_token(&parts.headers)?
        .ok_or_else(|| AppError::unauthorized(MSG_MISSING_CREDENTIALS))?;

    let claims = state.tokens.verify_access(token)?;
    let account_id = claims.account_id()?;

    let account = state
        .accounts
        .find_account(account_id)
        .await?
        .ok_or_else(|| AppError::unauthorized(MSG_ACCOUNT_NOT_FOUND))?;

    if !account.is_active {
        return Err(AppError::unauthorized(MSG_ACCOUNT_INACTIVE));
    }

    Ok(AuthenticatedAccount { account, claims })
}

impl FromRequestParts<AppState> for AuthenticatedAccount {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await {
            Ok(auth) => {
                security_event!(
                    SecurityEvent::AccessGranted,
                    account_id = auth.account.id,
                    path = %parts.uri.path(),
                    "Bearer token accepted"
                );
                Ok(auth)
            }
            Err(err) => {
                security_event!(
                    SecurityEvent::AccessDenied,
                    path = %parts.uri.path(),
                    reason = %err.message,
                    "Bearer token rejected"
                );
                Err(err)
            }
        }
    }
}

/// Authentication that never rejects, for public endpoints that only
/// report whether the caller is authenticated
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<AuthenticatedAccount>);

impl FromRequestParts<AppState> for MaybeAuthenticated {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state).await.ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&HeaderMap::new()).unwrap(), None);
        assert_eq!(bearer_token(&with_auth("Bearer abc.def")).unwrap(), Some("abc.def"));
        assert_eq!(bearer_token(&with_auth("bearer abc")).unwrap(), Some("abc"));
        assert!(bearer_token(&with_auth("Basic dXNlcjpwYXNz")).is_err());
        assert!(bearer_token(&with_auth("Bearer ")).is_err());
        assert!(bearer_token(&with_auth("Bearer")).is_err());
    }
}
