//! Identity records
//!
//! An [`Account`] owns credentials and names; a [`Profile`] owns the MVP
//! fields (CPF, phone, active flag) and points at exactly one Account.
//! [`ProfileView`] is the joined read model handed to handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Base authentication identity
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Account {
    pub id: i64,
    pub username: String,
    /// Stored lower-cased; unique case-insensitively
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl Account {
    /// "first last" when both names are present, else the username
    pub fn full_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        if !first.is_empty() && !last.is_empty() {
            format!("{} {}", first, last)
        } else {
            self.username.clone()
        }
    }
}

/// MVP extension of an Account
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Profile {
    pub id: i64,
    pub account_id: i64,
    /// Canonical `NNN.NNN.NNN-NN`
    pub cpf: String,
    /// Free text, empty when not provided
    pub phone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create an Account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

/// Fields needed to create the Profile linked to a new Account
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub cpf: String,
    pub phone: String,
}

/// Account and Profile read together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub account: Account,
    pub profile: Profile,
}

impl ProfileView {
    pub fn new(account: Account, profile: Profile) -> Self {
        Self { account, profile }
    }

    pub fn email(&self) -> &str {
        &self.account.email
    }

    pub fn full_name(&self) -> String {
        self.account.full_name()
    }

    /// Profile and Account both active
    pub fn fully_active(&self) -> bool {
        self.profile.is_active && self.account.is_active
    }
}

// ============================================================================
// Wire representations
// ============================================================================

/// User block returned by registration
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub nome_completo: String,
    pub email: String,
    pub cpf: String,
    pub telefone: String,
    pub ativo: bool,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

impl From<&ProfileView> for RegisteredUser {
    fn from(view: &ProfileView) -> Self {
        let nome_completo = view.full_name();
        Self {
            id: view.profile.id,
            message: format!("Usuário {} criado com sucesso!", nome_completo),
            nome_completo,
            email: view.email().to_string(),
            cpf: view.profile.cpf.clone(),
            telefone: view.profile.phone.clone(),
            ativo: view.profile.is_active,
            created_at: view.profile.created_at,
        }
    }
}

/// User block returned by login
#[derive(Debug, Clone, Serialize)]
pub struct LoggedInUser {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub nome_completo: String,
    pub cpf: String,
    pub telefone: String,
    pub ativo: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&ProfileView> for LoggedInUser {
    fn from(view: &ProfileView) -> Self {
        Self {
            id: view.profile.id,
            user_id: view.account.id,
            username: view.account.username.clone(),
            email: view.email().to_string(),
            nome_completo: view.full_name(),
            cpf: view.profile.cpf.clone(),
            telefone: view.profile.phone.clone(),
            ativo: view.profile.is_active,
            last_login: view.account.last_login,
            created_at: view.profile.created_at,
        }
    }
}

/// Full profile returned by the profile endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ProfileDetails {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub cpf: String,
    pub telefone: String,
    pub ativo: bool,
    pub nome_completo: String,
    pub esta_ativo_completo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProfileView> for ProfileDetails {
    fn from(view: &ProfileView) -> Self {
        Self {
            id: view.profile.id,
            username: view.account.username.clone(),
            email: view.email().to_string(),
            first_name: view.account.first_name.clone(),
            last_name: view.account.last_name.clone(),
            is_active: view.account.is_active,
            last_login: view.account.last_login,
            cpf: view.profile.cpf.clone(),
            telefone: view.profile.phone.clone(),
            ativo: view.profile.is_active,
            nome_completo: view.full_name(),
            esta_ativo_completo: view.fully_active(),
            created_at: view.profile.created_at,
            updated_at: view.profile.updated_at,
        }
    }
}

/// Minimal account identity, used when no profile exists
#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

impl From<&Account> for AccountInfo {
    fn from(account: &Account) -> Self {
        Self {
            user_id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn account() -> Account {
        Account {
            id: 7,
            username: "joao".into(),
            email: "joao@email.com".into(),
            password_hash: "$argon2id$stub".into(),
            first_name: "João".into(),
            last_name: "Silva".into(),
            is_active: true,
            last_login: None,
            date_joined: Utc::now(),
        }
    }

    pub fn profile() -> Profile {
        let now = Utc::now();
        Profile {
            id: 3,
            account_id: 7,
            cpf: "111.444.777-35".into(),
            phone: "11999999999".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{account, profile};
    use super::*;

    #[test]
    fn test_full_name_uses_both_names() {
        assert_eq!(account().full_name(), "João Silva");
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        let mut a = account();
        a.last_name.clear();
        assert_eq!(a.full_name(), "joao");
    }

    #[test]
    fn test_view_delegates_email_and_activity() {
        let mut view = ProfileView::new(account(), profile());
        assert_eq!(view.email(), "joao@email.com");
        assert!(view.fully_active());

        view.account.is_active = false;
        assert!(!view.fully_active());

        view.account.is_active = true;
        view.profile.is_active = false;
        assert!(!view.fully_active());
    }

    #[test]
    fn test_wire_shapes() {
        let view = ProfileView::new(account(), profile());

        let registered = serde_json::to_value(RegisteredUser::from(&view)).unwrap();
        assert_eq!(registered["id"], 3);
        assert_eq!(registered["cpf"], "111.444.777-35");
        assert_eq!(registered["message"], "Usuário João Silva criado com sucesso!");

        let logged_in = serde_json::to_value(LoggedInUser::from(&view)).unwrap();
        assert_eq!(logged_in["user_id"], 7);
        assert_eq!(logged_in["username"], "joao");
        assert!(logged_in["last_login"].is_null());

        let details = serde_json::to_value(ProfileDetails::from(&view)).unwrap();
        assert_eq!(details["nome_completo"], "João Silva");
        assert_eq!(details["esta_ativo_completo"], true);
        assert!(details.get("password_hash").is_none());
    }
}
