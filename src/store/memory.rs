//! In-memory identity store

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{IdentityStore, ProfileCounts, StoreError, StoreResult};
use crate::cpf::Cpf;
use crate::models::{Account, NewAccount, NewProfile, Profile, ProfileView};

/// In-memory store
///
/// All writes take one lock, so constraint checks and inserts are atomic
/// with respect to each other. Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    /// Keyed by account id
    profiles: BTreeMap<i64, Profile>,
    last_account_id: i64,
    last_profile_id: i64,
}

impl Tables {
    fn email_taken(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.accounts
            .values()
            .any(|a| a.email.to_lowercase() == email)
    }

    fn username_taken(&self, username: &str) -> bool {
        self.accounts.values().any(|a| a.username == username)
    }

    fn cpf_taken(&self, cpf: &str) -> bool {
        self.profiles.values().any(|p| p.cpf == cpf)
    }

    fn check_account(&self, account: &NewAccount) -> StoreResult<()> {
        if self.username_taken(&account.username) {
            return Err(StoreError::Conflict("accounts_username_key".into()));
        }
        if self.email_taken(&account.email) {
            return Err(StoreError::Conflict("accounts_email_lower_key".into()));
        }
        Ok(())
    }

    fn insert_account(&mut self, new: NewAccount, now: DateTime<Utc>) -> Account {
        self.last_account_id += 1;
        let account = Account {
            id: self.last_account_id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            is_active: true,
            last_login: None,
            date_joined: now,
        };
        self.accounts.insert(account.id, account.clone());
        account
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored Accounts
    pub async fn account_count(&self) -> usize {
        self.data.read().await.accounts.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(self.data.read().await.email_taken(email))
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self.data.read().await.username_taken(username))
    }

    async fn cpf_exists(&self, cpf: &str) -> StoreResult<bool> {
        Ok(self.data.read().await.cpf_taken(cpf))
    }

    async fn create_account_with_profile(
        &self,
        account: NewAccount,
        profile: NewProfile,
    ) -> StoreResult<ProfileView> {
        let cpf = Cpf::parse(&profile.cpf)?;

        let mut data = self.data.write().await;

        // Every constraint is checked before the first insert
        data.check_account(&account)?;
        if data.cpf_taken(cpf.as_str()) {
            return Err(StoreError::Conflict("profiles_cpf_key".into()));
        }

        let now = Utc::now();
        let account = data.insert_account(account, now);

        data.last_profile_id += 1;
        let profile = Profile {
            id: data.last_profile_id,
            account_id: account.id,
            cpf: cpf.into_string(),
            phone: profile.phone,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        data.profiles.insert(account.id, profile.clone());

        Ok(ProfileView::new(account, profile))
    }

    async fn create_account(&self, account: NewAccount) -> StoreResult<Account> {
        let mut data = self.data.write().await;
        data.check_account(&account)?;
        Ok(data.insert_account(account, Utc::now()))
    }

    async fn find_account(&self, id: i64) -> StoreResult<Option<Account>> {
        Ok(self.data.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let email = email.to_lowercase();
        Ok(self
            .data
            .read()
            .await
            .accounts
            .values()
            .find(|a| a.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_profile(&self, account_id: i64) -> StoreResult<Option<Profile>> {
        Ok(self.data.read().await.profiles.get(&account_id).cloned())
    }

    async fn record_login(&self, account_id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let account = data
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", account_id)))?;
        account.last_login = Some(at);
        Ok(())
    }

    async fn set_account_active(&self, account_id: i64, active: bool) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let account = data
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", account_id)))?;
        account.is_active = active;
        Ok(())
    }

    async fn set_profile_active(&self, account_id: i64, active: bool) -> StoreResult<Profile> {
        let mut data = self.data.write().await;
        let profile = data
            .profiles
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("profile for account {}", account_id)))?;
        profile.is_active = active;
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn delete_account(&self, account_id: i64) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if data.accounts.remove(&account_id).is_none() {
            return Err(StoreError::NotFound(format!("account {}", account_id)));
        }
        data.profiles.remove(&account_id);
        Ok(())
    }

    async fn profile_counts(&self) -> StoreResult<ProfileCounts> {
        let data = self.data.read().await;
        Ok(ProfileCounts {
            total: data.profiles.len() as u64,
            active: data.profiles.values().filter(|p| p.is_active).count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            first_name: "João".into(),
            last_name: "Silva".into(),
        }
    }

    fn new_profile(cpf: &str) -> NewProfile {
        NewProfile {
            cpf: cpf.into(),
            phone: "11999999999".into(),
        }
    }

    #[tokio::test]
    async fn test_create_pair_canonicalizes_cpf() {
        let store = MemoryStore::new();
        let view = store
            .create_account_with_profile(new_account("joao", "joao@email.com"), new_profile("11144477735"))
            .await
            .unwrap();

        assert_eq!(view.profile.cpf, "111.444.777-35");
        assert_eq!(view.profile.account_id, view.account.id);
        assert!(view.account.is_active);
        assert!(view.profile.is_active);
        assert!(store.cpf_exists("111.444.777-35").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_cpf_rejected_at_insert() {
        let store = MemoryStore::new();
        let err = store
            .create_account_with_profile(new_account("maria", "maria@email.com"), new_profile("12345678900"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCpf(_)));
        assert_eq!(store.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_pair_leaves_no_account() {
        let store = MemoryStore::new();
        store
            .create_account_with_profile(new_account("user1", "user1@email.com"), new_profile("111.444.777-35"))
            .await
            .unwrap();

        let err = store
            .create_account_with_profile(new_account("user2", "user2@email.com"), new_profile("11144477735"))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(store.account_count().await, 1);
        assert!(!store.email_exists("user2@email.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_email_unique_case_insensitive() {
        let store = MemoryStore::new();
        store
            .create_account(new_account("joao", "joao@email.com"))
            .await
            .unwrap();

        assert!(store.email_exists("JOAO@Email.com").await.unwrap());
        let err = store
            .create_account(new_account("joao2", "Joao@Email.com"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(store
            .find_account_by_email("JOAO@EMAIL.COM")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_username_unique() {
        let store = MemoryStore::new();
        store.create_account(new_account("joao", "a@email.com")).await.unwrap();
        assert!(store.username_exists("joao").await.unwrap());
        assert!(store
            .create_account(new_account("joao", "b@email.com"))
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_profile() {
        let store = MemoryStore::new();
        let view = store
            .create_account_with_profile(new_account("joao", "joao@email.com"), new_profile("52998224725"))
            .await
            .unwrap();

        store.delete_account(view.account.id).await.unwrap();

        assert!(store.find_account(view.account.id).await.unwrap().is_none());
        assert!(store.find_profile(view.account.id).await.unwrap().is_none());
        assert!(!store.cpf_exists("529.982.247-25").await.unwrap());
        assert!(matches!(
            store.delete_account(view.account.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_profile_toggle_and_counts() {
        let store = MemoryStore::new();
        let a = store
            .create_account_with_profile(new_account("a", "a@email.com"), new_profile("11144477735"))
            .await
            .unwrap();
        store
            .create_account_with_profile(new_account("b", "b@email.com"), new_profile("52998224725"))
            .await
            .unwrap();

        let profile = store.set_profile_active(a.account.id, false).await.unwrap();
        assert!(!profile.is_active);
        assert!(profile.updated_at >= a.profile.updated_at);

        assert_eq!(
            store.profile_counts().await.unwrap(),
            ProfileCounts { total: 2, active: 1 }
        );
    }

    #[tokio::test]
    async fn test_record_login_and_view() {
        let store = MemoryStore::new();
        let created = store
            .create_account_with_profile(new_account("joao", "joao@email.com"), new_profile("39053344705"))
            .await
            .unwrap();

        let at = Utc::now();
        store.record_login(created.account.id, at).await.unwrap();

        let view = store
            .find_profile_view(created.account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.account.last_login, Some(at));
    }

    #[tokio::test]
    async fn test_account_without_profile_has_no_view() {
        let store = MemoryStore::new();
        let account = store
            .create_account(new_account("semperfil", "semperfil@email.com"))
            .await
            .unwrap();
        assert!(store.find_profile_view(account.id).await.unwrap().is_none());
        assert!(store.find_profile_view(999).await.unwrap().is_none());
    }
}
