//! Minting share links.

use std::sync::Arc;

use photovault_core::{
    AlbumId, CapabilityClaims, CapabilityId, CapabilityToken, SigningKeypair, UserId,
};
use photovault_store::{ShareCapability, Store};

use crate::error::{Result, ShareError};

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// What an owner asks for when sharing an album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    pub owner: UserId,
    pub album: AlbumId,
    /// Lifetime of the link in hours. Must be at least 1.
    pub ttl_hours: u32,
    /// View limit; `None` for unlimited. `Some(0)` is rejected.
    pub max_views: Option<u32>,
}

impl IssueRequest {
    pub fn new(owner: impl Into<UserId>, album: impl Into<AlbumId>, ttl_hours: u32) -> Self {
        Self {
            owner: owner.into(),
            album: album.into(),
            ttl_hours,
            max_views: None,
        }
    }

    pub fn with_max_views(mut self, max_views: u32) -> Self {
        self.max_views = Some(max_views);
        self
    }

    fn check(&self) -> Result<()> {
        if self.ttl_hours == 0 {
            return Err(ShareError::InvalidPolicy("ttl_hours must be positive".into()));
        }
        if self.max_views == Some(0) {
            return Err(ShareError::InvalidPolicy("max_views must be positive".into()));
        }
        Ok(())
    }
}

/// A freshly minted link. The token is only ever available here.
#[derive(Debug, Clone)]
pub struct IssuedCapability {
    pub token: CapabilityToken,
    pub capability_id: CapabilityId,
    /// Unix ms.
    pub expires_at: i64,
}

impl IssuedCapability {
    /// Public path of the shared album.
    pub fn share_path(&self) -> String {
        format!("/share/{}", self.token.as_str())
    }
}

/// Issues signed share tokens and records their capability rows.
pub struct CapabilityIssuer<S: Store> {
    store: Arc<S>,
    signer: Arc<SigningKeypair>,
}

impl<S: Store> CapabilityIssuer<S> {
    pub fn new(store: Arc<S>, signer: Arc<SigningKeypair>) -> Self {
        Self { store, signer }
    }

    /// Mint a link for `request` at `now` (Unix ms).
    ///
    /// The stored row is written before the token is returned, so a token
    /// handed out always has a row to validate against.
    pub async fn issue(&self, request: &IssueRequest, now: i64) -> Result<IssuedCapability> {
        request.check()?;

        let expires_at = i64::from(request.ttl_hours)
            .checked_mul(MILLIS_PER_HOUR)
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| ShareError::InvalidPolicy("ttl_hours overflows".into()))?;

        let claims = CapabilityClaims::share(
            request.owner.clone(),
            request.album.clone(),
            now.div_euclid(1_000),
            i64::from(request.ttl_hours) * 3_600,
        );
        let token = claims.sign(&self.signer)?;

        let capability = ShareCapability {
            id: CapabilityId::generate(),
            album_id: request.album.clone(),
            owner_id: request.owner.clone(),
            token_hash: token.hash(),
            created_at: now,
            expires_at,
            max_views: request.max_views,
            view_count: 0,
            revoked: false,
        };
        self.store.insert_capability(&capability).await?;

        tracing::info!(
            capability = %capability.id,
            owner = %request.owner,
            album = %request.album,
            expires_at,
            max_views = ?request.max_views,
            "issued share capability"
        );

        Ok(IssuedCapability {
            token,
            capability_id: capability.id,
            expires_at,
        })
    }
}
