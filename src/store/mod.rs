//! Identity record store
//!
//! [`IdentityStore`] is the persistence seam for Accounts and Profiles.
//! Two backends implement it:
//!
//! - [`MemoryStore`]: in-process, used by tests and local runs
//! - `PgIdentityStore`: PostgreSQL via sqlx (`postgres` feature)
//!
//! Both enforce the same invariants: username, email (case-insensitive)
//! and CPF are unique; a Profile always has exactly one Account; the
//! Account+Profile pair is created atomically; deleting an Account removes
//! its Profile.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgIdentityStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cpf::CpfError;
use crate::models::{Account, NewAccount, NewProfile, Profile, ProfileView};

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// CPF failed validation at persistence time
    #[error("invalid CPF: {0}")]
    InvalidCpf(#[from] CpfError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Profile totals for the status endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileCounts {
    pub total: u64,
    pub active: u64,
}

/// Persistence operations over Accounts and Profiles
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Whether any Account has this email, compared case-insensitively
    async fn email_exists(&self, email: &str) -> StoreResult<bool>;

    async fn username_exists(&self, username: &str) -> StoreResult<bool>;

    /// Whether any Profile has this canonical CPF
    async fn cpf_exists(&self, cpf: &str) -> StoreResult<bool>;

    /// Create an Account and its Profile atomically.
    ///
    /// The CPF is re-validated and canonicalized before insert. On any
    /// failure nothing is persisted.
    async fn create_account_with_profile(
        &self,
        account: NewAccount,
        profile: NewProfile,
    ) -> StoreResult<ProfileView>;

    /// Create an Account with no Profile
    async fn create_account(&self, account: NewAccount) -> StoreResult<Account>;

    async fn find_account(&self, id: i64) -> StoreResult<Option<Account>>;

    /// Case-insensitive lookup
    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn find_profile(&self, account_id: i64) -> StoreResult<Option<Profile>>;

    async fn record_login(&self, account_id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    async fn set_account_active(&self, account_id: i64, active: bool) -> StoreResult<()>;

    /// Toggle the Profile flag; bumps `updated_at`
    async fn set_profile_active(&self, account_id: i64, active: bool) -> StoreResult<Profile>;

    /// Delete an Account; its Profile goes with it
    async fn delete_account(&self, account_id: i64) -> StoreResult<()>;

    async fn profile_counts(&self) -> StoreResult<ProfileCounts>;

    /// Account joined with its Profile, if both exist
    async fn find_profile_view(&self, account_id: i64) -> StoreResult<Option<ProfileView>> {
        let Some(account) = self.find_account(account_id).await? else {
            return Ok(None);
        };
        Ok(self
            .find_profile(account_id)
            .await?
            .map(|profile| ProfileView::new(account, profile)))
    }
}
