//! PostgreSQL identity store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{IdentityStore, ProfileCounts, StoreError, StoreResult};
use crate::cpf::Cpf;
use crate::models::{Account, NewAccount, NewProfile, Profile, ProfileView};

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     is_active, last_login, date_joined";

const PROFILE_COLUMNS: &str = "id, account_id, cpf, phone, is_active, created_at, updated_at";

/// Store backed by the `accounts` and `profiles` tables
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("row".into()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM accounts WHERE lower(email) = lower($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn cpf_exists(&self, cpf: &str) -> StoreResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM profiles WHERE cpf = $1)")
                .bind(cpf)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create_account_with_profile(
        &self,
        account: NewAccount,
        profile: NewProfile,
    ) -> StoreResult<ProfileView> {
        let cpf = Cpf::parse(&profile.cpf)?;

        // Dropping the transaction without commit rolls it back
        let mut tx = self.pool.begin().await?;

        let account: Account = sqlx::query_as(&format!(
            "INSERT INTO accounts (username, email, password_hash, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .fetch_one(&mut *tx)
        .await?;

        let profile: Profile = sqlx::query_as(&format!(
            "INSERT INTO profiles (account_id, cpf, phone) VALUES ($1, $2, $3) RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(account.id)
        .bind(cpf.as_str())
        .bind(&profile.phone)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ProfileView::new(account, profile))
    }

    async fn create_account(&self, account: NewAccount) -> StoreResult<Account> {
        let account = sqlx::query_as(&format!(
            "INSERT INTO accounts (username, email, password_hash, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_account(&self, id: i64) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE lower(email) = lower($1)",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_profile(&self, account_id: i64) -> StoreResult<Option<Profile>> {
        let profile = sqlx::query_as(&format!(
            "SELECT {} FROM profiles WHERE account_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn record_login(&self, account_id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE accounts SET last_login = $2 WHERE id = $1")
            .bind(account_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("account {}", account_id)));
        }
        Ok(())
    }

    async fn set_account_active(&self, account_id: i64, active: bool) -> StoreResult<()> {
        let result = sqlx::query("UPDATE accounts SET is_active = $2 WHERE id = $1")
            .bind(account_id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("account {}", account_id)));
        }
        Ok(())
    }

    async fn set_profile_active(&self, account_id: i64, active: bool) -> StoreResult<Profile> {
        sqlx::query_as(&format!(
            "UPDATE profiles SET is_active = $2, updated_at = now() \
             WHERE account_id = $1 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(account_id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("profile for account {}", account_id)))
    }

    async fn delete_account(&self, account_id: i64) -> StoreResult<()> {
        // profiles.account_id cascades
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("account {}", account_id)));
        }
        Ok(())
    }

    async fn profile_counts(&self) -> StoreResult<ProfileCounts> {
        let (total, active): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM profiles",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(ProfileCounts {
            total: total.max(0) as u64,
            active: active.max(0) as u64,
        })
    }
}
