//! Account registration, login and lifecycle
//!
//! [`AccountService`] holds the identity rules on top of an
//! [`IdentityStore`]: form validation, CPF canonicalization, uniqueness
//! checks, username derivation, password hashing and the ordered login
//! policy. Handlers stay thin and only shape responses.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::cpf::Cpf;
use crate::crypto::constant_time_str_eq;
use crate::error::{AppError, Result, PROFILE_NOT_FOUND, VALIDATION_ERROR};
use crate::models::{Account, NewAccount, NewProfile, Profile, ProfileView};
use crate::observability::SecurityEvent;
use crate::password::{hash_password, verify_password, PasswordPolicy};
use crate::security_event;
use crate::store::{IdentityStore, ProfileCounts};
use crate::validation::{
    normalize_email, validate_email, validate_max_length, validate_required,
    validate_text, FieldErrors, Validate,
};

pub const MSG_REGISTER_INVALID: &str = "Dados de registro inválidos.";
pub const MSG_LOGIN_INVALID: &str = "Dados de login inválidos.";
pub const MSG_EMAIL_TAKEN: &str = "Já existe uma conta com este email.";
pub const MSG_CPF_INVALID: &str = "CPF inválido. Verifique os números digitados.";
pub const MSG_CPF_TAKEN: &str = "Já existe uma conta com este CPF.";
pub const MSG_PASSWORD_MISMATCH: &str = "As senhas não coincidem.";
const MSG_CREATE_FAILED: &str = "Erro interno na criação da conta. Tente novamente.";

const FIRST_NAME_MAX: usize = 30;
const LAST_NAME_MAX: usize = 150;
const CPF_INPUT_MAX: usize = 14;
const PHONE_MAX: usize = 20;

// ============================================================================
// Requests
// ============================================================================

/// Registration form
///
/// Every field is optional at the JSON level so that a missing field is
/// reported as a field error rather than a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    pub cpf: Option<String>,
    pub telefone: Option<String>,
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

impl Validate for RegisterRequest {
    fn validate(&self) -> std::result::Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        let policy = PasswordPolicy::default();

        errors.check(validate_text(field(&self.first_name).trim(), FIRST_NAME_MAX, "first_name"));
        errors.check(validate_text(field(&self.last_name).trim(), LAST_NAME_MAX, "last_name"));
        errors.check(validate_email(field(&self.email)));

        let password = field(&self.password);
        if errors.check(validate_required(password, "password")) {
            if let Err(e) = policy.validate(password) {
                errors.add("password", e.user_message());
            }
        }

        errors.check(validate_required(field(&self.password_confirm), "password_confirm"));
        errors.check(validate_text(field(&self.cpf).trim(), CPF_INPUT_MAX, "cpf"));
        errors.check(validate_max_length(field(&self.telefone).trim(), PHONE_MAX, "telefone"));

        errors.into_result()
    }
}

/// Login form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Validate for LoginRequest {
    fn validate(&self) -> std::result::Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(validate_email(field(&self.email)));
        errors.check(validate_required(field(&self.password), "password"));
        errors.into_result()
    }
}

// ============================================================================
// Login rejections
// ============================================================================

/// Why a login was refused, in the order the checks run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRejection {
    UnknownEmail,
    WrongPassword,
    AccountInactive,
    /// Valid credentials but no MVP profile
    NoProfile,
    ProfileInactive,
}

impl LoginRejection {
    pub fn field(&self) -> &'static str {
        match self {
            Self::WrongPassword => "password",
            _ => "email",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::UnknownEmail => "Nenhuma conta encontrada com este email.",
            Self::WrongPassword => "Senha incorreta.",
            Self::AccountInactive => "Esta conta está desativada.",
            Self::NoProfile => "Conta sem perfil MVP. Use o sistema principal.",
            Self::ProfileInactive => "Perfil MVP desativado.",
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoProfile => PROFILE_NOT_FOUND,
            _ => VALIDATION_ERROR,
        }
    }

    /// Short tag for logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnknownEmail => "unknown_email",
            Self::WrongPassword => "wrong_password",
            Self::AccountInactive => "account_inactive",
            Self::NoProfile => "no_profile",
            Self::ProfileInactive => "profile_inactive",
        }
    }
}

impl From<LoginRejection> for AppError {
    fn from(rejection: LoginRejection) -> Self {
        AppError::validation(
            MSG_LOGIN_INVALID,
            FieldErrors::single(rejection.field(), rejection.message()),
        )
        .with_code(rejection.error_code())
    }
}

// ============================================================================
// Service
// ============================================================================

/// Identity rules over a store
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn IdentityStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    /// Validate the form and create the Account + Profile pair.
    ///
    /// Format errors and business errors (taken email, invalid or taken
    /// CPF) are collected together. The password confirmation is only
    /// compared once every other field is clean.
    pub async fn register(&self, req: RegisterRequest) -> Result<ProfileView> {
        let mut errors = req.validate().err().unwrap_or_default();

        let email = normalize_email(field(&req.email));
        if !errors.contains("email") && self.store.email_exists(&email).await? {
            errors.add("email", MSG_EMAIL_TAKEN);
        }

        let mut cpf = None;
        if !errors.contains("cpf") {
            match Cpf::parse(field(&req.cpf)) {
                Ok(parsed) => {
                    if self.store.cpf_exists(parsed.as_str()).await? {
                        errors.add("cpf", MSG_CPF_TAKEN);
                    } else {
                        cpf = Some(parsed);
                    }
                }
                Err(_) => errors.add("cpf", MSG_CPF_INVALID),
            }
        }

        if errors.is_empty()
            && !constant_time_str_eq(field(&req.password), field(&req.password_confirm))
        {
            errors.add("password_confirm", MSG_PASSWORD_MISMATCH);
        }

        let Some(cpf) = cpf.filter(|_| errors.is_empty()) else {
            return Err(AppError::validation(MSG_REGISTER_INVALID, errors));
        };

        let username = self.unique_username(&email).await?;
        let password_hash = hash_blocking(field(&req.password).to_string()).await?;

        let account = NewAccount {
            username,
            email,
            password_hash,
            first_name: field(&req.first_name).trim().to_string(),
            last_name: field(&req.last_name).trim().to_string(),
        };
        let profile = NewProfile {
            cpf: cpf.into_string(),
            phone: field(&req.telefone).trim().to_string(),
        };

        let view = self
            .store
            .create_account_with_profile(account, profile)
            .await
            .map_err(|e| AppError::internal(MSG_CREATE_FAILED, e))?;

        security_event!(
            SecurityEvent::AccountRegistered,
            account_id = view.account.id,
            profile_id = view.profile.id,
            email = %view.account.email,
            "MVP account created"
        );

        Ok(view)
    }

    /// Email local part, suffixed with 1, 2, ... until unused
    pub async fn unique_username(&self, email: &str) -> Result<String> {
        let base = email.split('@').next().unwrap_or(email);
        let mut username = base.to_string();
        let mut counter: u32 = 1;
        while self.store.username_exists(&username).await? {
            username = format!("{}{}", base, counter);
            counter += 1;
        }
        Ok(username)
    }

    /// Check credentials in order and stamp `last_login` on success
    pub async fn login(&self, req: LoginRequest) -> Result<ProfileView> {
        req.validate()
            .map_err(|errors| AppError::validation(MSG_LOGIN_INVALID, errors))?;

        let email = normalize_email(field(&req.email));
        let password = field(&req.password).to_string();

        let Some(mut account) = self.store.find_account_by_email(&email).await? else {
            return Err(reject(LoginRejection::UnknownEmail, &email));
        };

        if !verify_blocking(password, account.password_hash.clone()).await? {
            return Err(reject(LoginRejection::WrongPassword, &email));
        }

        if !account.is_active {
            return Err(reject(LoginRejection::AccountInactive, &email));
        }

        let Some(profile) = self.store.find_profile(account.id).await? else {
            return Err(reject(LoginRejection::NoProfile, &email));
        };

        if !profile.is_active {
            return Err(reject(LoginRejection::ProfileInactive, &email));
        }

        let now = Utc::now();
        self.store.record_login(account.id, now).await?;
        account.last_login = Some(now);

        security_event!(
            SecurityEvent::LoginSucceeded,
            account_id = account.id,
            email = %email,
            "Login succeeded"
        );

        Ok(ProfileView::new(account, profile))
    }

    /// Profile of an authenticated account, `None` when it has none
    pub async fn profile_for(&self, account: &Account) -> Result<Option<ProfileView>> {
        Ok(self
            .store
            .find_profile(account.id)
            .await?
            .map(|profile| ProfileView::new(account.clone(), profile)))
    }

    pub async fn find_account(&self, account_id: i64) -> Result<Option<Account>> {
        Ok(self.store.find_account(account_id).await?)
    }

    pub async fn activate_profile(&self, account_id: i64) -> Result<Profile> {
        self.set_profile_active(account_id, true).await
    }

    pub async fn deactivate_profile(&self, account_id: i64) -> Result<Profile> {
        self.set_profile_active(account_id, false).await
    }

    async fn set_profile_active(&self, account_id: i64, active: bool) -> Result<Profile> {
        let profile = self.store.set_profile_active(account_id, active).await?;
        security_event!(
            SecurityEvent::AccountStatusChanged,
            account_id = account_id,
            profile_active = active,
            "MVP profile status changed"
        );
        Ok(profile)
    }

    pub async fn set_account_active(&self, account_id: i64, active: bool) -> Result<()> {
        self.store.set_account_active(account_id, active).await?;
        security_event!(
            SecurityEvent::AccountStatusChanged,
            account_id = account_id,
            account_active = active,
            "Account status changed"
        );
        Ok(())
    }

    /// Delete an account together with its profile
    pub async fn delete_account(&self, account_id: i64) -> Result<()> {
        self.store.delete_account(account_id).await?;
        security_event!(SecurityEvent::AccountDeleted, account_id = account_id, "Account deleted");
        Ok(())
    }

    pub async fn stats(&self) -> Result<ProfileCounts> {
        Ok(self.store.profile_counts().await?)
    }
}

fn reject(rejection: LoginRejection, email: &str) -> AppError {
    security_event!(
        SecurityEvent::LoginFailed,
        email = %email,
        reason = rejection.reason(),
        "Login rejected"
    );
    rejection.into()
}

async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::internal("Password hashing task failed", e))?
        .map_err(AppError::from)
}

async fn verify_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::internal("Password verification task failed", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::MemoryStore;

    fn service() -> (AccountService, MemoryStore) {
        let store = MemoryStore::new();
        (AccountService::new(Arc::new(store.clone())), store)
    }

    fn register_req(email: &str, cpf: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: Some("João".into()),
            last_name: Some("Silva".into()),
            email: Some(email.into()),
            password: Some("senha123456".into()),
            password_confirm: Some("senha123456".into()),
            cpf: Some(cpf.into()),
            telefone: Some("11999999999".into()),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn field_errors(err: &AppError) -> &FieldErrors {
        err.field_errors.as_ref().expect("field errors")
    }

    #[tokio::test]
    async fn test_register_creates_pair() {
        let (service, store) = service();
        let view = service
            .register(register_req(" Joao@Email.com ", "11144477735"))
            .await
            .unwrap();

        assert_eq!(view.account.email, "joao@email.com");
        assert_eq!(view.account.username, "joao");
        assert_eq!(view.profile.cpf, "111.444.777-35");
        assert_eq!(view.profile.phone, "11999999999");
        assert_ne!(view.account.password_hash, "senha123456");
        assert!(verify_password("senha123456", &view.account.password_hash));
        assert_eq!(store.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_collects_format_errors() {
        let (service, store) = service();
        let err = service
            .register(RegisterRequest {
                first_name: Some("x".repeat(31)),
                email: Some("not-an-email".into()),
                password: Some("curta".into()),
                telefone: Some("1".repeat(21)),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.message, MSG_REGISTER_INVALID);
        let errors = field_errors(&err);
        for name in [
            "first_name",
            "last_name",
            "email",
            "password",
            "password_confirm",
            "cpf",
            "telefone",
        ] {
            assert!(errors.contains(name), "missing error for {}", name);
        }
        assert_eq!(store.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_trims_profile_fields_but_not_password() {
        let (service, store) = service();
        let mut req = register_req("ana@email.com", "  111.444.777-35  ");
        req.first_name = Some("  Ana ".into());
        req.last_name = Some(" Souza  ".into());
        req.telefone = Some("  1199 ".into());
        req.password = Some(" senha123456".into());
        req.password_confirm = Some(" senha123456".into());

        let view = service.register(req).await.unwrap();

        let account = store.find_account(view.account.id).await.unwrap().unwrap();
        let profile = store.find_profile(account.id).await.unwrap().unwrap();
        assert_eq!(account.first_name, "Ana");
        assert_eq!(account.last_name, "Souza");
        assert_eq!(profile.cpf, "111.444.777-35");
        assert_eq!(profile.phone, "1199");

        assert!(verify_password(" senha123456", &account.password_hash));
        assert!(!verify_password("senha123456", &account.password_hash));

        let err = service
            .login(login_req("ana@email.com", "senha123456"))
            .await
            .unwrap_err();
        assert!(field_errors(&err).contains("password"));
        assert!(service.login(login_req("ana@email.com", " senha123456")).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_rejects_email_longer_than_column() {
        let (service, store) = service();
        let email = format!("{}@{}.com", "a".repeat(64), "b".repeat(240));

        let err = service
            .register(register_req(&email, "11144477735"))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(
            field_errors(&err).get("email"),
            Some(&[crate::validation::MSG_INVALID_EMAIL.to_string()][..])
        );
        assert_eq!(store.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_short_password_uses_policy_message() {
        let (service, _) = service();
        let mut req = register_req("curta@email.com", "11144477735");
        req.password = Some("curta".into());
        req.password_confirm = Some("curta".into());

        let err = service.register(req).await.unwrap_err();

        let expected = PasswordPolicy::default()
            .validate("curta")
            .unwrap_err()
            .user_message();
        assert_eq!(field_errors(&err).get("password"), Some(&[expected][..]));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_any_case() {
        let (service, _) = service();
        service
            .register(register_req("joao@email.com", "11144477735"))
            .await
            .unwrap();

        let err = service
            .register(register_req("JOAO@EMAIL.COM", "52998224725"))
            .await
            .unwrap_err();
        assert_eq!(field_errors(&err).get("email"), Some(&[MSG_EMAIL_TAKEN.to_string()][..]));
        assert!(!field_errors(&err).contains("cpf"));
    }

    #[tokio::test]
    async fn test_register_duplicate_cpf_after_canonicalization() {
        let (service, _) = service();
        service
            .register(register_req("a@email.com", "11144477735"))
            .await
            .unwrap();

        let err = service
            .register(register_req("b@email.com", "111.444.777-35"))
            .await
            .unwrap_err();
        assert_eq!(field_errors(&err).get("cpf"), Some(&[MSG_CPF_TAKEN.to_string()][..]));
    }

    #[tokio::test]
    async fn test_register_invalid_cpf() {
        let (service, store) = service();
        let err = service
            .register(register_req("maria@email.com", "12345678900"))
            .await
            .unwrap_err();
        assert_eq!(field_errors(&err).get("cpf"), Some(&[MSG_CPF_INVALID.to_string()][..]));
        assert_eq!(store.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_password_mismatch_only_when_fields_clean() {
        let (service, _) = service();

        let mut req = register_req("joao@email.com", "11144477735");
        req.password_confirm = Some("outrasenha123".into());
        let err = service.register(req.clone()).await.unwrap_err();
        assert_eq!(
            field_errors(&err).get("password_confirm"),
            Some(&[MSG_PASSWORD_MISMATCH.to_string()][..])
        );

        req.cpf = Some("12345678900".into());
        let err = service.register(req).await.unwrap_err();
        assert!(field_errors(&err).contains("cpf"));
        assert!(!field_errors(&err).contains("password_confirm"));
    }

    #[tokio::test]
    async fn test_username_suffixes() {
        let (service, _) = service();
        let cpfs = ["11144477735", "52998224725", "39053344705"];
        let domains = ["email.com", "outro.com", "terceiro.com.br"];

        let mut usernames = Vec::new();
        for (cpf, domain) in cpfs.iter().zip(domains) {
            let view = service
                .register(register_req(&format!("joao@{}", domain), cpf))
                .await
                .unwrap();
            usernames.push(view.account.username);
        }
        assert_eq!(usernames, vec!["joao", "joao1", "joao2"]);
    }

    #[tokio::test]
    async fn test_login_success_stamps_last_login() {
        let (service, store) = service();
        let created = service
            .register(register_req("joao@email.com", "11144477735"))
            .await
            .unwrap();
        assert!(created.account.last_login.is_none());

        let view = service
            .login(login_req("JOAO@email.com", "senha123456"))
            .await
            .unwrap();
        assert_eq!(view.account.id, created.account.id);
        assert!(view.account.last_login.is_some());

        let stored = store.find_account(created.account.id).await.unwrap().unwrap();
        assert_eq!(stored.last_login, view.account.last_login);
    }

    #[tokio::test]
    async fn test_login_rejections_in_order() {
        let (service, store) = service();
        let created = service
            .register(register_req("joao@email.com", "11144477735"))
            .await
            .unwrap();
        let id = created.account.id;

        let check = |err: AppError, rejection: LoginRejection| {
            assert_eq!(err.message, MSG_LOGIN_INVALID);
            assert_eq!(err.error_code, rejection.error_code());
            assert_eq!(
                field_errors(&err).get(rejection.field()),
                Some(&[rejection.message().to_string()][..])
            );
        };

        let err = service.login(login_req("ninguem@email.com", "senha123456")).await.unwrap_err();
        check(err, LoginRejection::UnknownEmail);

        let err = service.login(login_req("joao@email.com", "errada12345")).await.unwrap_err();
        check(err, LoginRejection::WrongPassword);

        service.deactivate_profile(id).await.unwrap();
        let err = service.login(login_req("joao@email.com", "senha123456")).await.unwrap_err();
        check(err, LoginRejection::ProfileInactive);

        service.set_account_active(id, false).await.unwrap();
        let err = service.login(login_req("joao@email.com", "errada12345")).await.unwrap_err();
        check(err, LoginRejection::WrongPassword);
        let err = service.login(login_req("joao@email.com", "senha123456")).await.unwrap_err();
        check(err, LoginRejection::AccountInactive);

        service.set_account_active(id, true).await.unwrap();
        service.activate_profile(id).await.unwrap();
        assert!(service.login(login_req("joao@email.com", "senha123456")).await.is_ok());

        let bare = store
            .create_account(NewAccount {
                username: "semperfil".into(),
                email: "semperfil@email.com".into(),
                password_hash: hash_password("senha123456").unwrap(),
                first_name: "Sem".into(),
                last_name: "Perfil".into(),
            })
            .await
            .unwrap();
        let err = service
            .login(login_req("semperfil@email.com", "senha123456"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code, PROFILE_NOT_FOUND);
        check(err, LoginRejection::NoProfile);
        assert!(service.profile_for(&bare).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_format_errors() {
        let (service, _) = service();
        let err = service.login(LoginRequest::default()).await.unwrap_err();
        assert_eq!(err.error_code, VALIDATION_ERROR);
        assert!(field_errors(&err).contains("email"));
        assert!(field_errors(&err).contains("password"));
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let (service, _) = service();
        let a = service
            .register(register_req("a@email.com", "11144477735"))
            .await
            .unwrap();
        service
            .register(register_req("b@email.com", "52998224725"))
            .await
            .unwrap();
        service.deactivate_profile(a.account.id).await.unwrap();

        assert_eq!(service.stats().await.unwrap(), ProfileCounts { total: 2, active: 1 });

        service.delete_account(a.account.id).await.unwrap();
        assert_eq!(service.stats().await.unwrap(), ProfileCounts { total: 1, active: 1 });
        assert!(service.find_account(a.account.id).await.unwrap().is_none());

        let err = service.delete_account(a.account.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
