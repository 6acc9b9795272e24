//! Public retrieval through share links.
//!
//! This is the only path by which someone without an account reads
//! content. Every call validates the bearer token and consumes one view
//! before anything is loaded or decrypted.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use photovault_core::{AlbumId, CapabilityToken, ContentCipher, CoreError, ImageId, ObjectKind};
use photovault_share::{CapabilityContext, CapabilityValidator};
use photovault_store::{now_millis, Store};

use crate::error::{Result, VaultError};
use crate::user_keys::UserKeyManager;

/// Album catalogue and blob storage, owned by the surrounding application.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Images in an album, in display order. Empty for an unknown album.
    async fn album_images(&self, album: &AlbumId) -> Result<Vec<ImageId>>;

    /// Sealed bytes of one object, if stored.
    async fn image_blob(
        &self,
        album: &AlbumId,
        image: &ImageId,
        kind: ObjectKind,
    ) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
impl<T: ContentSource + ?Sized> ContentSource for Arc<T> {
    async fn album_images(&self, album: &AlbumId) -> Result<Vec<ImageId>> {
        (**self).album_images(album).await
    }

    async fn image_blob(
        &self,
        album: &AlbumId,
        image: &ImageId,
        kind: ObjectKind,
    ) -> Result<Option<Vec<u8>>> {
        (**self).image_blob(album, image, kind).await
    }
}

/// What a link holder is told when a request fails.
///
/// Deliberately coarse: a holder cannot tell a forged token from an expired
/// or revoked one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("internal error")]
    Internal,
}

/// A shared album as seen through a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedAlbum {
    pub album: AlbumId,
    pub images: Vec<SharedImage>,
    /// Views left after this one, `None` if unlimited.
    pub remaining_views: Option<u32>,
    /// Unix ms.
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedImage {
    pub id: ImageId,
    /// Public path that fetches this image with the same token.
    pub path: String,
}

/// Serves shared albums to link holders.
pub struct ShareGateway<S: Store, C: ContentSource> {
    validator: Arc<CapabilityValidator<S>>,
    user_keys: UserKeyManager<S>,
    source: C,
}

impl<S: Store, C: ContentSource> ShareGateway<S, C> {
    pub fn new(
        validator: Arc<CapabilityValidator<S>>,
        user_keys: UserKeyManager<S>,
        source: C,
    ) -> Self {
        Self {
            validator,
            user_keys,
            source,
        }
    }

    /// `GET /share/{token}`. Consumes one view.
    pub async fn list_album(
        &self,
        token: &CapabilityToken,
    ) -> std::result::Result<SharedAlbum, AccessDenied> {
        self.list_album_at(token, now_millis()).await
    }

    pub async fn list_album_at(
        &self,
        token: &CapabilityToken,
        now: i64,
    ) -> std::result::Result<SharedAlbum, AccessDenied> {
        self.try_list(token, now).await.map_err(deny)
    }

    /// `GET /share/{token}/image/{id}`. Consumes one view.
    pub async fn fetch_image(
        &self,
        token: &CapabilityToken,
        image: &ImageId,
    ) -> std::result::Result<Vec<u8>, AccessDenied> {
        self.fetch_image_at(token, image, ObjectKind::Original, now_millis())
            .await
    }

    /// Thumbnail variant of [`ShareGateway::fetch_image`]. Also consumes a view.
    pub async fn fetch_thumbnail(
        &self,
        token: &CapabilityToken,
        image: &ImageId,
    ) -> std::result::Result<Vec<u8>, AccessDenied> {
        self.fetch_image_at(token, image, ObjectKind::Thumbnail, now_millis())
            .await
    }

    pub async fn fetch_image_at(
        &self,
        token: &CapabilityToken,
        image: &ImageId,
        kind: ObjectKind,
        now: i64,
    ) -> std::result::Result<Vec<u8>, AccessDenied> {
        self.try_fetch(token, image, kind, now).await.map_err(deny)
    }

    async fn try_list(&self, token: &CapabilityToken, now: i64) -> Result<SharedAlbum> {
        let ctx = self.validator.validate(token, now).await?;
        let images = self.source.album_images(&ctx.album).await?;

        Ok(SharedAlbum {
            images: images
                .into_iter()
                .map(|id| SharedImage {
                    path: format!("/share/{}/image/{}", token.as_str(), id),
                    id,
                })
                .collect(),
            album: ctx.album,
            remaining_views: ctx.remaining_views,
            expires_at: ctx.expires_at,
        })
    }

    async fn try_fetch(
        &self,
        token: &CapabilityToken,
        image: &ImageId,
        kind: ObjectKind,
        now: i64,
    ) -> Result<Vec<u8>> {
        let ctx = self.validator.validate(token, now).await?;

        if !self.source.album_images(&ctx.album).await?.contains(image) {
            return Err(VaultError::ImageNotFound(image.clone()));
        }
        let blob = self
            .source
            .image_blob(&ctx.album, image, kind)
            .await?
            .ok_or_else(|| VaultError::ImageNotFound(image.clone()))?;

        self.decrypt_for(&ctx, kind, &blob).await
    }

    async fn decrypt_for(
        &self,
        ctx: &CapabilityContext,
        kind: ObjectKind,
        blob: &[u8],
    ) -> Result<Vec<u8>> {
        let key = self.user_keys.user_key(&ctx.owner).await?.ok_or_else(|| {
            CoreError::KeyUnavailable(format!("owner {} has no data key", ctx.owner))
        })?;
        Ok(ContentCipher::new(&key).decrypt(kind, blob)?)
    }
}

/// Collapse a failure into what the link holder sees, logging the real
/// reason.
fn deny(err: VaultError) -> AccessDenied {
    match &err {
        VaultError::Share(share) if share.is_capability_failure() => {
            tracing::info!(reason = %share, "share access denied");
            AccessDenied::Unauthorized
        }
        VaultError::ImageNotFound(image) => {
            tracing::debug!(image = %image, "shared image not found");
            AccessDenied::NotFound
        }
        VaultError::Core(CoreError::DecryptionIntegrity) => {
            tracing::error!("shared object failed integrity check, possible tampering");
            AccessDenied::Internal
        }
        _ => {
            tracing::error!(error = %err, "share request failed");
            AccessDenied::Internal
        }
    }
}
