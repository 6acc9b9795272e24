//! The Vault: one explicit instance holding every key the service uses.
//!
//! Nothing here is global. Keys are loaded once in [`Vault::start`], are
//! immutable afterwards, and are zeroized once the vault and every gateway
//! it handed out have been dropped.

use std::sync::Arc;

use photovault_core::{
    AlbumId, CapabilityId, ContentCipher, CoreError, Ed25519PublicKey, KeyOrigin, KeyVault,
    ObjectKind, SigningKeypair, UserId,
};
use photovault_share::{
    CapabilityIssuer, CapabilityStats, CapabilityValidator, IssueRequest, IssuedCapability,
};
use photovault_store::{now_millis, SqliteStore, Store};

use crate::config::{Environment, VaultConfig};
use crate::error::Result;
use crate::gateway::{ContentSource, ShareGateway};
use crate::user_keys::UserKeyManager;

/// Encryption at rest plus share-link administration.
pub struct Vault<S: Store> {
    environment: Environment,
    keys: Arc<KeyVault>,
    signer: Arc<SigningKeypair>,
    store: Arc<S>,
    user_keys: UserKeyManager<S>,
    issuer: CapabilityIssuer<S>,
    validator: Arc<CapabilityValidator<S>>,
}

impl Vault<SqliteStore> {
    /// Start a vault over the SQLite database named in `config`, or an
    /// in-memory one if none is set.
    pub fn open(config: VaultConfig) -> Result<Self> {
        let store = match &config.database_path {
            Some(path) => SqliteStore::open(path)?,
            None => SqliteStore::open_memory()?,
        };
        Self::start(config, store)
    }
}

impl<S: Store> Vault<S> {
    /// Load key material from `config` and start serving.
    ///
    /// In production a missing or weak secret is fatal. In development a
    /// missing secret is replaced with a random one for this process only.
    pub fn start(config: VaultConfig, store: S) -> Result<Self> {
        config.validate()?;

        let keys = match config.master_secret.as_ref() {
            Some(secret) => KeyVault::from_secret(secret.as_bytes())?,
            None if config.environment == Environment::Development => {
                tracing::warn!(
                    "no master secret configured, using an ephemeral key; \
                     sealed data will not survive a restart"
                );
                KeyVault::ephemeral()
            }
            None => {
                return Err(CoreError::KeyUnavailable("master secret is not configured".into()).into())
            }
        };

        let signer = match config.signing_secret.as_ref() {
            Some(secret) => SigningKeypair::from_secret(secret.as_bytes())?,
            None => {
                tracing::warn!(
                    "no signing secret configured, using an ephemeral key; \
                     share links will not survive a restart"
                );
                SigningKeypair::generate()
            }
        };

        tracing::info!(
            environment = %config.environment,
            origin = ?keys.origin(),
            master = %keys.fingerprint(),
            signing = %signer.public_key().to_hex(),
            "vault started"
        );

        let keys = Arc::new(keys);
        let signer = Arc::new(signer);
        let store = Arc::new(store);

        Ok(Self {
            environment: config.environment,
            user_keys: UserKeyManager::new(Arc::clone(&store), Arc::clone(&keys)),
            issuer: CapabilityIssuer::new(Arc::clone(&store), Arc::clone(&signer)),
            validator: Arc::new(CapabilityValidator::new(
                Arc::clone(&store),
                signer.public_key(),
            )),
            keys,
            signer,
            store,
        })
    }

    /// Drop this vault's references to its key material.
    ///
    /// Gateways returned by [`Vault::gateway`] share the master key and keep
    /// serving until they are dropped too; the key is zeroized with the last
    /// of them.
    pub fn shutdown(self) {
        tracing::info!(master = %self.keys.fingerprint(), "vault shut down");
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn key_origin(&self) -> KeyOrigin {
        self.keys.origin()
    }

    /// Public key that verifies share tokens.
    pub fn verifying_key(&self) -> Ed25519PublicKey {
        self.signer.public_key()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn user_keys(&self) -> &UserKeyManager<S> {
        &self.user_keys
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Content
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt an object for `user`, creating their key on first use.
    pub async fn seal_object(
        &self,
        user: &UserId,
        kind: ObjectKind,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let key = self.user_keys.ensure_user_key(user).await?;
        Ok(ContentCipher::new(&key).encrypt(kind, plaintext)?)
    }

    /// Decrypt an object previously sealed for `user`.
    pub async fn open_object(&self, user: &UserId, kind: ObjectKind, blob: &[u8]) -> Result<Vec<u8>> {
        let key = self.user_keys.user_key(user).await?.ok_or_else(|| {
            CoreError::KeyUnavailable(format!("user {user} has no data key"))
        })?;

        ContentCipher::new(&key).decrypt(kind, blob).map_err(|e| {
            if matches!(e, CoreError::DecryptionIntegrity) {
                tracing::error!(user = %user, kind = ?kind, "object failed integrity check, possible tampering");
            }
            e.into()
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────────────────────

    /// Mint a share link for an album.
    pub async fn create_share_link(&self, request: &IssueRequest) -> Result<IssuedCapability> {
        Ok(self.issuer.issue(request, now_millis()).await?)
    }

    /// Revoke a share link. Revoking twice is fine.
    pub async fn revoke_share(&self, id: &CapabilityId) -> Result<()> {
        Ok(self.validator.revoke(id).await?)
    }

    pub async fn share_stats(&self, id: &CapabilityId) -> Result<CapabilityStats> {
        Ok(self.validator.stats(id, now_millis()).await?)
    }

    /// Every link `owner` has minted for `album`.
    pub async fn album_shares(
        &self,
        owner: &UserId,
        album: &AlbumId,
    ) -> Result<Vec<CapabilityStats>> {
        Ok(self
            .validator
            .list_for_album(owner, album, now_millis())
            .await?)
    }

    /// Public retrieval path over `source`.
    ///
    /// The gateway holds its own handle on the master key and is not
    /// invalidated by [`Vault::shutdown`].
    pub fn gateway<C: ContentSource>(&self, source: C) -> ShareGateway<S, C> {
        ShareGateway::new(Arc::clone(&self.validator), self.user_keys.clone(), source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use photovault_store::MemoryStore;

    const MASTER: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn vault() -> Vault<MemoryStore> {
        Vault::start(
            VaultConfig::with_secrets(MASTER, "separate signing passphrase"),
            MemoryStore::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_seal_open_roundtrip() {
        let vault = vault();
        let user = UserId::new("u1");

        let blob = vault
            .seal_object(&user, ObjectKind::Original, b"raw jpeg")
            .await
            .unwrap();
        assert_ne!(&blob[..], b"raw jpeg");

        let plain = vault
            .open_object(&user, ObjectKind::Original, &blob)
            .await
            .unwrap();
        assert_eq!(plain, b"raw jpeg");
    }

    #[tokio::test]
    async fn test_other_user_cannot_open() {
        let vault = vault();
        let blob = vault
            .seal_object(&UserId::new("u1"), ObjectKind::Original, b"x")
            .await
            .unwrap();
        vault
            .seal_object(&UserId::new("u2"), ObjectKind::Original, b"y")
            .await
            .unwrap();

        let err = vault
            .open_object(&UserId::new("u2"), ObjectKind::Original, &blob)
            .await
            .unwrap_err();
        assert!(err.is_integrity_failure());
    }

    #[tokio::test]
    async fn test_open_without_key_is_unavailable() {
        let vault = vault();
        let err = vault
            .open_object(&UserId::new("nobody"), ObjectKind::Thumbnail, b"blob")
            .await
            .unwrap_err();
        assert!(err.is_key_unavailable());
    }

    #[test]
    fn test_development_without_secrets_is_ephemeral() {
        let vault = Vault::start(VaultConfig::default(), MemoryStore::new()).unwrap();
        assert_eq!(vault.key_origin(), KeyOrigin::Ephemeral);
        assert_eq!(vault.environment(), Environment::Development);
        vault.shutdown();
    }

    #[test]
    fn test_passphrase_secret_is_derived() {
        let vault = Vault::start(
            VaultConfig::with_secrets("a passphrase", "another passphrase"),
            MemoryStore::new(),
        )
        .unwrap();
        assert_eq!(vault.key_origin(), KeyOrigin::Derived);
    }

    #[test]
    fn test_production_without_secret_fails() {
        let config = VaultConfig {
            environment: Environment::Production,
            ..VaultConfig::default()
        };
        match Vault::start(config, MemoryStore::new()) {
            Err(err) => assert!(err.is_key_unavailable()),
            Ok(_) => panic!("production vault started without a master secret"),
        }
    }

    #[tokio::test]
    async fn test_share_admin_roundtrip() {
        let vault = vault();
        let owner = UserId::new("u1");
        let album = AlbumId::new("a1");

        let issued = vault
            .create_share_link(&IssueRequest::new(owner.clone(), album.clone(), 24).with_max_views(3))
            .await
            .unwrap();
        assert!(issued.share_path().starts_with("/share/"));

        let stats = vault.share_stats(&issued.capability_id).await.unwrap();
        assert_eq!(stats.view_count, 0);
        assert_eq!(stats.max_views, Some(3));

        vault.revoke_share(&issued.capability_id).await.unwrap();
        let shares = vault.album_shares(&owner, &album).await.unwrap();
        assert_eq!(shares.len(), 1);
        assert!(shares[0].revoked);

        assert!(matches!(
            vault.revoke_share(&CapabilityId::generate()).await,
            Err(VaultError::Share(_))
        ));
    }
}
