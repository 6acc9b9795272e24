//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite with no persistence. The check-and-increment in
//! `consume_view` happens under a single write guard, which makes it atomic
//! within one process.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use photovault_core::{AlbumId, CapabilityId, TokenHash, UserId};

use crate::error::{Result, StoreError};
use crate::records::{CapabilityState, ShareCapability, UserKeyRecord};
use crate::traits::{ConsumeOutcome, InsertResult, RevokeOutcome, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    user_keys: HashMap<UserId, UserKeyRecord>,

    /// Capabilities indexed by id.
    capabilities: HashMap<CapabilityId, ShareCapability>,

    /// Token hash -> capability id.
    by_hash: HashMap<TokenHash, CapabilityId>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn capability_by_hash_mut(&mut self, hash: &TokenHash) -> Option<&mut ShareCapability> {
        let id = self.by_hash.get(hash)?;
        self.capabilities.get_mut(id)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user_key(&self, user: &UserId) -> Result<Option<UserKeyRecord>> {
        Ok(self.read()?.user_keys.get(user).cloned())
    }

    async fn insert_user_key_if_absent(&self, record: &UserKeyRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if let Some(existing) = inner.user_keys.get(&record.user_id) {
            return Ok(InsertResult::AlreadyExists {
                existing: existing.clone(),
            });
        }

        inner
            .user_keys
            .insert(record.user_id.clone(), record.clone());
        Ok(InsertResult::Inserted)
    }

    async fn delete_user_key(&self, user: &UserId) -> Result<bool> {
        Ok(self.write()?.user_keys.remove(user).is_some())
    }

    async fn insert_capability(&self, capability: &ShareCapability) -> Result<()> {
        let mut inner = self.write()?;

        if inner.capabilities.contains_key(&capability.id)
            || inner.by_hash.contains_key(&capability.token_hash)
        {
            return Err(StoreError::Conflict(format!(
                "capability {} already exists",
                capability.id
            )));
        }

        inner.by_hash.insert(capability.token_hash, capability.id);
        inner.capabilities.insert(capability.id, capability.clone());
        Ok(())
    }

    async fn get_capability(&self, id: &CapabilityId) -> Result<Option<ShareCapability>> {
        Ok(self.read()?.capabilities.get(id).cloned())
    }

    async fn get_capability_by_hash(&self, hash: &TokenHash) -> Result<Option<ShareCapability>> {
        let inner = self.read()?;
        Ok(inner
            .by_hash
            .get(hash)
            .and_then(|id| inner.capabilities.get(id))
            .cloned())
    }

    async fn consume_view(
        &self,
        hash: &TokenHash,
        owner: &UserId,
        album: &AlbumId,
        now: i64,
    ) -> Result<ConsumeOutcome> {
        let mut inner = self.write()?;

        let Some(cap) = inner.capability_by_hash_mut(hash) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if &cap.owner_id != owner || &cap.album_id != album {
            return Ok(ConsumeOutcome::Mismatched(cap.clone()));
        }

        match cap.state(now) {
            CapabilityState::Active => {
                cap.view_count += 1;
                Ok(ConsumeOutcome::Consumed(cap.clone()))
            }
            state => Ok(ConsumeOutcome::Rejected(state)),
        }
    }

    async fn revoke_capability(&self, id: &CapabilityId) -> Result<RevokeOutcome> {
        let mut inner = self.write()?;

        Ok(match inner.capabilities.get_mut(id) {
            Some(cap) if cap.revoked => RevokeOutcome::AlreadyRevoked,
            Some(cap) => {
                cap.revoked = true;
                RevokeOutcome::Revoked
            }
            None => RevokeOutcome::NotFound,
        })
    }

    async fn list_capabilities(
        &self,
        owner: &UserId,
        album: &AlbumId,
    ) -> Result<Vec<ShareCapability>> {
        let inner = self.read()?;

        let mut caps: Vec<ShareCapability> = inner
            .capabilities
            .values()
            .filter(|cap| &cap.owner_id == owner && &cap.album_id == album)
            .cloned()
            .collect();
        caps.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_bytes().cmp(b.id.as_bytes()))
        });

        Ok(caps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn capability(token: &str, max_views: Option<u32>) -> ShareCapability {
        ShareCapability {
            id: CapabilityId::generate(),
            album_id: AlbumId::new("a1"),
            owner_id: UserId::new("u1"),
            token_hash: TokenHash::of(token),
            created_at: 0,
            expires_at: 1_000,
            max_views,
            view_count: 0,
            revoked: false,
        }
    }

    async fn consume(store: &impl Store, cap: &ShareCapability, now: i64) -> ConsumeOutcome {
        store
            .consume_view(&cap.token_hash, &cap.owner_id, &cap.album_id, now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_consume_stops_at_limit() {
        let store = MemoryStore::new();
        let cap = capability("t1", Some(1));
        store.insert_capability(&cap).await.unwrap();

        assert!(matches!(
            consume(&store, &cap, 0).await,
            ConsumeOutcome::Consumed(_)
        ));
        assert_eq!(
            consume(&store, &cap, 0).await,
            ConsumeOutcome::Rejected(CapabilityState::Exhausted)
        );
    }

    #[tokio::test]
    async fn test_consume_with_wrong_binding_changes_nothing() {
        let store = MemoryStore::new();
        let cap = capability("t1", Some(1));
        store.insert_capability(&cap).await.unwrap();

        assert_eq!(
            store
                .consume_view(&cap.token_hash, &UserId::new("u2"), &cap.album_id, 0)
                .await
                .unwrap(),
            ConsumeOutcome::Mismatched(cap.clone())
        );
        assert!(matches!(consume(&store, &cap, 0).await, ConsumeOutcome::Consumed(_)));
    }

    #[tokio::test]
    async fn test_duplicate_capability_conflicts() {
        let store = MemoryStore::new();
        let cap = capability("t1", None);
        store.insert_capability(&cap).await.unwrap();

        let mut same_hash = capability("t1", None);
        same_hash.id = CapabilityId::generate();
        assert!(matches!(
            store.insert_capability(&same_hash).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_revoke_then_consume() {
        let store = MemoryStore::new();
        let cap = capability("t1", None);
        store.insert_capability(&cap).await.unwrap();

        assert_eq!(store.revoke_capability(&cap.id).await.unwrap(), RevokeOutcome::Revoked);
        assert_eq!(
            store.revoke_capability(&cap.id).await.unwrap(),
            RevokeOutcome::AlreadyRevoked
        );
        assert_eq!(
            consume(&store, &cap, 0).await,
            ConsumeOutcome::Rejected(CapabilityState::Revoked)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_never_overshoots() {
        let store = Arc::new(MemoryStore::new());
        let cap = capability("t1", Some(5));
        store.insert_capability(&cap).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            let cap = cap.clone();
            handles.push(tokio::spawn(async move {
                store
                    .consume_view(&cap.token_hash, &cap.owner_id, &cap.album_id, 0)
                    .await
                    .unwrap()
            }));
        }

        let mut consumed = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), ConsumeOutcome::Consumed(_)) {
                consumed += 1;
            }
        }

        assert_eq!(consumed, 5);
        let row = store.get_capability(&cap.id).await.unwrap().unwrap();
        assert_eq!(row.view_count, 5);
    }
}
