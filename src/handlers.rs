//! HTTP handlers for the MVP identity endpoints

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accounts::{LoginRequest, RegisterRequest};
use crate::auth::{AuthenticatedAccount, MaybeAuthenticated};
use crate::error::{AppError, Result, MISSING_REFRESH_TOKEN, PROFILE_NOT_FOUND};
use crate::models::{AccountInfo, LoggedInUser, ProfileDetails, RegisteredUser};
use crate::observability::SecurityEvent;
use crate::router::AppState;
use crate::security_event;
use crate::token::TokenPair;
use crate::validation::{FieldErrors, JsonBody, NON_FIELD_ERRORS};

// ============================================================================
// Register
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: RegisteredUser,
    pub tokens: TokenPair,
    pub sistema: String,
    pub versao: String,
    pub registered_at: DateTime<Utc>,
}

/// `POST /register/`
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let view = state.accounts.register(req).await?;
    let tokens = state.tokens.issue_pair(&view.account)?;
    let identity = state.tokens.identity();

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: format!("Conta criada com sucesso para {}!", view.full_name()),
            user: RegisteredUser::from(&view),
            tokens,
            sistema: identity.system_name.clone(),
            versao: identity.version.clone(),
            registered_at: Utc::now(),
        }),
    ))
}

// ============================================================================
// Login
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: LoggedInUser,
    pub tokens: TokenPair,
    pub sistema: String,
    pub versao: String,
    pub login_at: DateTime<Utc>,
}

/// `POST /login/`
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let view = state.accounts.login(req).await?;
    let tokens = state.tokens.issue_pair(&view.account)?;
    let identity = state.tokens.identity();

    Ok(Json(LoginResponse {
        success: true,
        message: "Login realizado com sucesso!".to_string(),
        user: LoggedInUser::from(&view),
        tokens,
        sistema: identity.system_name.clone(),
        versao: identity.version.clone(),
        login_at: Utc::now(),
    }))
}

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub message: String,
    pub user: ProfileDetails,
    pub sistema: String,
    pub versao: String,
    pub profile_retrieved_at: DateTime<Utc>,
}

/// Body of the 404 returned when the account has no profile
#[derive(Debug, Serialize)]
pub struct ProfileNotFound {
    pub success: bool,
    pub message: String,
    pub error_code: &'static str,
    pub user_info: AccountInfo,
}

/// `GET /profile/`
pub async fn profile(State(state): State<AppState>, auth: AuthenticatedAccount) -> Result<Response> {
    let Some(view) = state.accounts.profile_for(&auth.account).await? else {
        tracing::warn!(account_id = auth.account.id, "Account has no MVP profile");
        let body = ProfileNotFound {
            success: false,
            message: "Perfil MVP não encontrado para este usuário.".to_string(),
            error_code: PROFILE_NOT_FOUND,
            user_info: AccountInfo::from(&auth.account),
        };
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    };

    let identity = state.tokens.identity();
    Ok(Json(ProfileResponse {
        success: true,
        message: "Perfil carregado com sucesso.".to_string(),
        user: ProfileDetails::from(&view),
        sistema: identity.system_name.clone(),
        versao: identity.version.clone(),
        profile_retrieved_at: Utc::now(),
    })
    .into_response())
}

// ============================================================================
// Logout
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
    pub sistema: String,
    pub logout_at: DateTime<Utc>,
}

/// `POST /logout/`
///
/// Acknowledges the logout; tokens stay valid until they expire. An empty
/// body counts as a missing refresh token.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthenticatedAccount,
    body: Bytes,
) -> Result<Json<LogoutResponse>> {
    let req: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            AppError::validation(
                "Dados inválidos.",
                FieldErrors::single(NON_FIELD_ERRORS, "JSON inválido."),
            )
            .with_details(e.to_string())
        })?
    };

    if req.refresh_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
        return Err(AppError::bad_request("Refresh token é obrigatório para logout.")
            .with_code(MISSING_REFRESH_TOKEN));
    }

    security_event!(SecurityEvent::Logout, account_id = auth.account.id, "Logout");

    Ok(Json(LogoutResponse {
        success: true,
        message: "Logout realizado com sucesso.".to_string(),
        sistema: state.tokens.identity().system_name.clone(),
        logout_at: Utc::now(),
    }))
}

// ============================================================================
// Diagnostics
// ============================================================================

#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total_mvp_users: u64,
    pub mvp_users_ativos: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub sistema: String,
    pub versao: String,
    pub status: &'static str,
    pub mvp_ready: bool,
    pub endpoints_implementados: Vec<String>,
    pub estatisticas: Statistics,
    pub user_authenticated: bool,
    pub timestamp: DateTime<Utc>,
}

/// `GET /test/`
pub async fn status(
    State(state): State<AppState>,
    MaybeAuthenticated(auth): MaybeAuthenticated,
) -> Result<Json<StatusResponse>> {
    let counts = state.accounts.stats().await?;
    let identity = state.tokens.identity();
    let prefix = &state.config.path_prefix;

    let endpoints_implementados = crate::router::ENDPOINTS
        .iter()
        .map(|(method, path)| format!("{} {}{}", method, prefix, path))
        .collect();

    Ok(Json(StatusResponse {
        sistema: identity.system_name.clone(),
        versao: identity.version.clone(),
        status: "FUNCIONANDO",
        mvp_ready: true,
        endpoints_implementados,
        estatisticas: Statistics {
            total_mvp_users: counts.total,
            mvp_users_ativos: counts.active,
        },
        user_authenticated: auth.is_some(),
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub is_authenticated: bool,
}

#[derive(Debug, Serialize)]
pub struct MvpInfo {
    pub mvp_user_id: i64,
    pub nome_completo: String,
    pub cpf: String,
    pub ativo: bool,
}

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub valid: bool,
    pub tested_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProtectedTestResponse {
    pub message: String,
    pub user_info: UserInfo,
    pub mvp_info: Option<MvpInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub token_info: TokenInfo,
    pub sistema: String,
    pub versao: String,
}

/// `GET /protected-test/`
pub async fn protected_test(
    State(state): State<AppState>,
    auth: AuthenticatedAccount,
) -> Result<Json<ProtectedTestResponse>> {
    let view = state.accounts.profile_for(&auth.account).await?;
    let identity = state.tokens.identity();

    let user_info = UserInfo {
        user_id: auth.account.id,
        username: auth.account.username.clone(),
        email: auth.account.email.clone(),
        is_authenticated: true,
    };

    let (message, mvp_info, warning) = match view {
        Some(view) => (
            "Acesso autorizado ao MVP!",
            Some(MvpInfo {
                mvp_user_id: view.profile.id,
                nome_completo: view.full_name(),
                cpf: view.profile.cpf.clone(),
                ativo: view.profile.is_active,
            }),
            None,
        ),
        None => (
            "Usuário autenticado mas sem perfil MVP",
            None,
            Some("User sem perfil MVP vinculado".to_string()),
        ),
    };

    Ok(Json(ProtectedTestResponse {
        message: message.to_string(),
        user_info,
        mvp_info,
        warning,
        token_info: TokenInfo {
            valid: true,
            tested_at: Utc::now(),
        },
        sistema: identity.system_name.clone(),
        versao: identity.version.clone(),
    }))
}
