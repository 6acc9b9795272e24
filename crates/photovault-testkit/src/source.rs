//! In-memory album catalogue and blob storage.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use photovault::{ContentSource, Result, VaultError};
use photovault_core::{AlbumId, ImageId, ObjectKind};

type BlobKey = (AlbumId, ImageId, ObjectKind);

/// [`ContentSource`] backed by hash maps.
#[derive(Default)]
pub struct MemoryContentSource {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    albums: HashMap<AlbumId, Vec<ImageId>>,
    blobs: HashMap<BlobKey, Vec<u8>>,
    offline: bool,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sealed blob and add the image to its album if it is new.
    pub fn put(&self, album: &AlbumId, image: &ImageId, kind: ObjectKind, blob: Vec<u8>) {
        let mut inner = self.inner.write().unwrap();
        let images = inner.albums.entry(album.clone()).or_default();
        if !images.contains(image) {
            images.push(image.clone());
        }
        inner
            .blobs
            .insert((album.clone(), image.clone(), kind), blob);
    }

    /// Drop a blob but leave the image listed.
    pub fn remove_blob(&self, album: &AlbumId, image: &ImageId, kind: ObjectKind) {
        self.inner
            .write()
            .unwrap()
            .blobs
            .remove(&(album.clone(), image.clone(), kind));
    }

    /// Flip one bit of a stored blob. Returns false if there is no such blob.
    pub fn tamper(&self, album: &AlbumId, image: &ImageId, kind: ObjectKind, byte: usize) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.blobs.get_mut(&(album.clone(), image.clone(), kind)) {
            Some(blob) if !blob.is_empty() => {
                let idx = byte % blob.len();
                blob[idx] ^= 0x01;
                true
            }
            _ => false,
        }
    }

    /// Make every subsequent call fail, as if the backing storage were down.
    pub fn set_offline(&self, offline: bool) {
        self.inner.write().unwrap().offline = offline;
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn album_images(&self, album: &AlbumId) -> Result<Vec<ImageId>> {
        let inner = self.inner.read().unwrap();
        if inner.offline {
            return Err(VaultError::Source("content source offline".into()));
        }
        Ok(inner.albums.get(album).cloned().unwrap_or_default())
    }

    async fn image_blob(
        &self,
        album: &AlbumId,
        image: &ImageId,
        kind: ObjectKind,
    ) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read().unwrap();
        if inner.offline {
            return Err(VaultError::Source("content source offline".into()));
        }
        Ok(inner
            .blobs
            .get(&(album.clone(), image.clone(), kind))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_lists_image_once() {
        let source = MemoryContentSource::new();
        let album = AlbumId::new("a1");
        let image = ImageId::new("i1");

        source.put(&album, &image, ObjectKind::Original, vec![1, 2, 3]);
        source.put(&album, &image, ObjectKind::Thumbnail, vec![4]);

        assert_eq!(source.album_images(&album).await.unwrap(), vec![image.clone()]);
        assert_eq!(
            source
                .image_blob(&album, &image, ObjectKind::Thumbnail)
                .await
                .unwrap(),
            Some(vec![4])
        );
        assert!(source
            .album_images(&AlbumId::new("missing"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_tamper_flips_a_bit() {
        let source = MemoryContentSource::new();
        let album = AlbumId::new("a1");
        let image = ImageId::new("i1");
        source.put(&album, &image, ObjectKind::Original, vec![0, 0]);

        assert!(source.tamper(&album, &image, ObjectKind::Original, 3));
        assert_eq!(
            source
                .image_blob(&album, &image, ObjectKind::Original)
                .await
                .unwrap(),
            Some(vec![0, 1])
        );
        assert!(!source.tamper(&album, &image, ObjectKind::Thumbnail, 0));
    }

    #[tokio::test]
    async fn test_offline_source_errors() {
        let source = MemoryContentSource::new();
        source.set_offline(true);
        assert!(matches!(
            source.album_images(&AlbumId::new("a1")).await,
            Err(VaultError::Source(_))
        ));
    }
}
