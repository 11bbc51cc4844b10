//! JWT access and refresh tokens
//!
//! Tokens are HS256-signed with the service secret. Both kinds carry the
//! standard `sub`/`iat`/`exp`/`jti` claims, a `token_type` discriminator and
//! three fixed identity claims (`sistema`, `versao`, `tipo_conta`) so that
//! other MultiBPO services can tell MVP accounts apart.
//!
//! There is no revocation list: a token is valid until it expires.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;
use crate::models::Account;

/// Token kind, serialized into the `token_type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub sistema: String,
    pub versao: String,
    pub tipo_conta: String,
}

impl Claims {
    /// Account id parsed from `sub`
    pub fn account_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Invalid)
    }
}

/// Token failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token invalid")]
    Invalid,

    /// A refresh token was presented where an access token is required
    #[error("wrong token type")]
    WrongType,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(_) => AppError::internal("Token creation failed", err),
            TokenError::Expired => AppError::unauthorized("Token expirado."),
            TokenError::Invalid | TokenError::WrongType => {
                AppError::unauthorized("Token inválido.")
            }
        }
    }
}

/// Identity claims stamped on every token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub system_name: String,
    pub version: String,
    pub account_kind: String,
}

impl Default for IdentityClaims {
    fn default() -> Self {
        Self {
            system_name: "MultiBPO MVP".to_string(),
            version: "1.0".to_string(),
            account_kind: "mvp".to_string(),
        }
    }
}

/// Issued token pair as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    /// Seconds
    pub access_expires_in: u64,
    /// Seconds
    pub refresh_expires_in: u64,
}

/// Signs and verifies tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
    identity: IdentityClaims,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_lifetime", &self.access_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(
        secret: &str,
        access_lifetime: Duration,
        refresh_lifetime: Duration,
        identity: IdentityClaims,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_lifetime,
            refresh_lifetime,
            identity,
        }
    }

    pub fn identity(&self) -> &IdentityClaims {
        &self.identity
    }

    /// Issue an access + refresh pair for the account
    pub fn issue_pair(&self, account: &Account) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(account.id, TokenType::Access)?,
            refresh: self.issue(account.id, TokenType::Refresh)?,
            access_expires_in: self.access_lifetime.as_secs(),
            refresh_expires_in: self.refresh_lifetime.as_secs(),
        })
    }

    pub fn issue(&self, account_id: i64, token_type: TokenType) -> Result<String, TokenError> {
        let lifetime = match token_type {
            TokenType::Access => self.access_lifetime,
            TokenType::Refresh => self.refresh_lifetime,
        };
        let now = Utc::now().timestamp();

        let claims = Claims {
            sub: account_id.to_string(),
            token_type,
            iat: now,
            exp: now.saturating_add(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX)),
            jti: uuid::Uuid::new_v4().to_string(),
            sistema: self.identity.system_name.clone(),
            versao: self.identity.version.clone(),
            tipo_conta: self.identity.account_kind.clone(),
        };

        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Decode and check signature and expiry, any token type
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// Verify a bearer credential; refresh tokens are rejected
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type != TokenType::Access {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::account;

    const SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            SECRET,
            Duration::from_secs(300),
            Duration::from_secs(86_400),
            IdentityClaims::default(),
        )
    }

    #[test]
    fn test_pair_carries_identity_claims() {
        let issuer = issuer();
        let pair = issuer.issue_pair(&account()).unwrap();

        assert_eq!(pair.access_expires_in, 300);
        assert_eq!(pair.refresh_expires_in, 86_400);

        let claims = issuer.verify_access(&pair.access).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.account_id(), Ok(7));
        assert_eq!(claims.sistema, "MultiBPO MVP");
        assert_eq!(claims.versao, "1.0");
        assert_eq!(claims.tipo_conta, "mvp");
        assert_eq!(claims.exp - claims.iat, 300);

        let refresh = issuer.verify(&pair.refresh).unwrap();
        assert_eq!(refresh.token_type, TokenType::Refresh);
        assert_eq!(refresh.sistema, "MultiBPO MVP");
        assert_ne!(refresh.jti, claims.jti);
    }

    #[test]
    fn test_refresh_rejected_as_access() {
        let issuer = issuer();
        let pair = issuer.issue_pair(&account()).unwrap();
        assert_eq!(
            issuer.verify_access(&pair.refresh),
            Err(TokenError::WrongType)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let pair = issuer().issue_pair(&account()).unwrap();
        let other = TokenIssuer::new(
            "another-secret-that-is-at-least-32-bytes",
            Duration::from_secs(300),
            Duration::from_secs(86_400),
            IdentityClaims::default(),
        );
        assert_eq!(other.verify_access(&pair.access), Err(TokenError::Invalid));
        assert_eq!(issuer().verify_access("not.a.jwt"), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_rejected() {
        let issuer = issuer();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "7".into(),
            token_type: TokenType::Access,
            iat: now - 600,
            exp: now - 300,
            jti: uuid::Uuid::new_v4().to_string(),
            sistema: "MultiBPO MVP".into(),
            versao: "1.0".into(),
            tipo_conta: "mvp".into(),
        };
        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verify_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_custom_identity_claims() {
        let issuer = TokenIssuer::new(
            SECRET,
            Duration::from_secs(60),
            Duration::from_secs(120),
            IdentityClaims {
                system_name: "MultiBPO Teste".into(),
                version: "2.0".into(),
                account_kind: "trial".into(),
            },
        );
        let token = issuer.issue(1, TokenType::Access).unwrap();
        let claims = issuer.verify_access(&token).unwrap();
        assert_eq!(claims.sistema, "MultiBPO Teste");
        assert_eq!(claims.tipo_conta, "trial");
    }

    #[test]
    fn test_error_maps_to_status() {
        use axum::http::StatusCode;
        assert_eq!(
            AppError::from(TokenError::Expired).kind.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(TokenError::Encoding("x".into())).kind.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
