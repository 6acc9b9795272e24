//! Per-user data-encryption keys.

use std::sync::Arc;

use photovault_core::{DataKey, KeyVault, UserId};
use photovault_store::{now_millis, InsertResult, Store, UserKeyRecord};

use crate::error::Result;

/// Creates and recovers each user's DEK.
///
/// A DEK is generated on the user's first write and stored only in wrapped
/// form. Concurrent first writes for one user all end up with the same key:
/// whichever insert lands first wins and the others adopt its record.
pub struct UserKeyManager<S: Store> {
    store: Arc<S>,
    vault: Arc<KeyVault>,
}

impl<S: Store> Clone for UserKeyManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            vault: Arc::clone(&self.vault),
        }
    }
}

impl<S: Store> UserKeyManager<S> {
    pub fn new(store: Arc<S>, vault: Arc<KeyVault>) -> Self {
        Self { store, vault }
    }

    /// The user's DEK, created on first use.
    pub async fn ensure_user_key(&self, user: &UserId) -> Result<DataKey> {
        if let Some(record) = self.store.get_user_key(user).await? {
            return self.open_record(&record);
        }

        let key = DataKey::generate();
        let record = UserKeyRecord {
            user_id: user.clone(),
            wrapped_dek: self.vault.wrap(&key)?,
            created_at: now_millis(),
        };

        match self.store.insert_user_key_if_absent(&record).await? {
            InsertResult::Inserted => {
                tracing::info!(user = %user, "created data key");
                Ok(key)
            }
            InsertResult::AlreadyExists { existing } => {
                tracing::debug!(user = %user, "lost data key race, adopting stored key");
                self.open_record(&existing)
            }
        }
    }

    /// The user's DEK if one exists. Never creates a key.
    pub async fn user_key(&self, user: &UserId) -> Result<Option<DataKey>> {
        match self.store.get_user_key(user).await? {
            Some(record) => self.open_record(&record).map(Some),
            None => Ok(None),
        }
    }

    /// Delete the user's wrapped key. Everything sealed under it becomes
    /// unreadable. Returns whether a key existed.
    pub async fn forget_user(&self, user: &UserId) -> Result<bool> {
        let removed = self.store.delete_user_key(user).await?;
        if removed {
            tracing::info!(user = %user, "deleted data key");
        }
        Ok(removed)
    }

    fn open_record(&self, record: &UserKeyRecord) -> Result<DataKey> {
        self.vault.unwrap(&record.wrapped_dek).map_err(|e| {
            tracing::error!(
                user = %record.user_id,
                error = %e,
                "stored data key does not open under the active master key"
            );
            e.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photovault_store::MemoryStore;

    fn manager(store: Arc<MemoryStore>, vault: KeyVault) -> UserKeyManager<MemoryStore> {
        UserKeyManager::new(store, Arc::new(vault))
    }

    #[tokio::test]
    async fn test_first_write_creates_then_reuses() {
        let keys = manager(Arc::new(MemoryStore::new()), KeyVault::ephemeral());
        let user = UserId::new("u1");

        assert!(keys.user_key(&user).await.unwrap().is_none());
        let created = keys.ensure_user_key(&user).await.unwrap();
        let again = keys.ensure_user_key(&user).await.unwrap();
        assert_eq!(created, again);
        assert_eq!(keys.user_key(&user).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_users_get_independent_keys() {
        let keys = manager(Arc::new(MemoryStore::new()), KeyVault::ephemeral());
        let a = keys.ensure_user_key(&UserId::new("u1")).await.unwrap();
        let b = keys.ensure_user_key(&UserId::new("u2")).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_changed_master_key_is_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let user = UserId::new("u1");

        manager(Arc::clone(&store), KeyVault::from_secret("first secret").unwrap())
            .ensure_user_key(&user)
            .await
            .unwrap();

        let err = manager(store, KeyVault::from_secret("second secret").unwrap())
            .ensure_user_key(&user)
            .await
            .unwrap_err();
        assert!(err.is_key_unavailable());
    }

    #[tokio::test]
    async fn test_forget_user() {
        let keys = manager(Arc::new(MemoryStore::new()), KeyVault::ephemeral());
        let user = UserId::new("u1");
        keys.ensure_user_key(&user).await.unwrap();

        assert!(keys.forget_user(&user).await.unwrap());
        assert!(!keys.forget_user(&user).await.unwrap());
        assert!(keys.user_key(&user).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_first_writes_agree() {
        let keys = manager(Arc::new(MemoryStore::new()), KeyVault::ephemeral());
        let user = UserId::new("u1");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let keys = keys.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                keys.ensure_user_key(&user).await.unwrap()
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        let stored = keys.user_key(&user).await.unwrap().unwrap();
        assert!(results.iter().all(|key| key == &stored));
    }
}
