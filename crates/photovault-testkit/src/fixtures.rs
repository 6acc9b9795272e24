//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::Path;
use std::sync::Arc;

use photovault::{ShareGateway, Vault, VaultConfig};
use photovault_core::{AlbumId, ImageId, ObjectKind, UserId};
use photovault_store::{MemoryStore, SqliteStore, Store};

use crate::source::MemoryContentSource;

/// Master secret in direct (hex) form.
pub const TEST_MASTER_SECRET: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// Signing secret in passphrase form.
pub const TEST_SIGNING_SECRET: &str = "photovault testkit signing passphrase, not for production";

/// Config with fixed secrets, so keys survive a vault restart.
pub fn test_config() -> VaultConfig {
    VaultConfig::with_secrets(TEST_MASTER_SECRET, TEST_SIGNING_SECRET)
}

/// A vault plus an in-memory content source it can serve from.
pub struct TestFixture<S: Store = MemoryStore> {
    pub vault: Vault<S>,
    pub source: Arc<MemoryContentSource>,
}

impl TestFixture<MemoryStore> {
    /// Fixture over an in-memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture<SqliteStore> {
    /// Fixture over a SQLite file at `path`.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self::with_store(SqliteStore::open(path).unwrap())
    }
}

impl<S: Store> TestFixture<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            vault: Vault::start(test_config(), store).unwrap(),
            source: Arc::new(MemoryContentSource::new()),
        }
    }

    /// Seal an original and a thumbnail for `owner` and store both.
    pub async fn upload(&self, owner: &str, album: &str, image: &str, original: &[u8]) {
        let owner = UserId::new(owner);
        let album = AlbumId::new(album);
        let image = ImageId::new(image);

        let sealed = self
            .vault
            .seal_object(&owner, ObjectKind::Original, original)
            .await
            .unwrap();
        self.source.put(&album, &image, ObjectKind::Original, sealed);

        let thumb = self
            .vault
            .seal_object(&owner, ObjectKind::Thumbnail, &thumbnail_of(original))
            .await
            .unwrap();
        self.source.put(&album, &image, ObjectKind::Thumbnail, thumb);
    }

    /// Gateway serving from this fixture's source.
    pub fn gateway(&self) -> ShareGateway<S, Arc<MemoryContentSource>> {
        self.vault.gateway(Arc::clone(&self.source))
    }
}

/// Stand-in thumbnail: the first 16 bytes of the original.
pub fn thumbnail_of(original: &[u8]) -> Vec<u8> {
    original.iter().take(16).copied().collect()
}

/// Deterministic fake image bytes.
pub fn image_bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use photovault::share::IssueRequest;

    #[tokio::test]
    async fn test_upload_then_fetch() {
        let fixture = TestFixture::new();
        let original = image_bytes(7, 64);
        fixture.upload("u1", "a1", "i1", &original).await;

        let link = fixture
            .vault
            .create_share_link(&IssueRequest::new("u1", "a1", 1))
            .await
            .unwrap();
        let gateway = fixture.gateway();

        let fetched = gateway
            .fetch_image(&link.token, &ImageId::new("i1"))
            .await
            .unwrap();
        assert_eq!(fetched, original);

        let thumb = gateway
            .fetch_thumbnail(&link.token, &ImageId::new("i1"))
            .await
            .unwrap();
        assert_eq!(thumb, thumbnail_of(&original));
    }

    #[tokio::test]
    async fn test_sqlite_fixture_reopens_with_same_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.db");
        let owner = UserId::new("u1");

        let sealed = {
            let fixture = TestFixture::sqlite(&path);
            fixture
                .vault
                .seal_object(&owner, ObjectKind::Original, b"persisted")
                .await
                .unwrap()
        };

        let fixture = TestFixture::sqlite(&path);
        let plain = fixture
            .vault
            .open_object(&owner, ObjectKind::Original, &sealed)
            .await
            .unwrap();
        assert_eq!(plain, b"persisted");
    }
}
