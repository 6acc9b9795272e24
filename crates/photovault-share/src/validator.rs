//! Validating, consuming and administering share links.

use std::sync::Arc;

use photovault_core::{
    AlbumId, CapabilityId, CapabilityToken, Ed25519PublicKey, TokenType, UserId,
};
use photovault_store::{CapabilityState, ConsumeOutcome, RevokeOutcome, ShareCapability, Store};

use crate::error::{Result, ShareError};

/// What a successful validation grants: read access to one album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityContext {
    pub capability_id: CapabilityId,
    pub owner: UserId,
    pub album: AlbumId,
    /// View count including the view just consumed.
    pub view_count: u32,
    pub remaining_views: Option<u32>,
    /// Unix ms.
    pub expires_at: i64,
}

/// Administrative snapshot of one capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityStats {
    pub capability_id: CapabilityId,
    pub owner: UserId,
    pub album: AlbumId,
    pub created_at: i64,
    pub expires_at: i64,
    pub max_views: Option<u32>,
    pub view_count: u32,
    pub revoked: bool,
    /// State as of the time the snapshot was taken.
    pub state: CapabilityState,
}

impl CapabilityStats {
    fn from_row(row: ShareCapability, now: i64) -> Self {
        let state = row.state(now);
        Self {
            capability_id: row.id,
            owner: row.owner_id,
            album: row.album_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            max_views: row.max_views,
            view_count: row.view_count,
            revoked: row.revoked,
            state,
        }
    }
}

/// Checks bearer tokens against their stored capability rows.
///
/// Holds only the public half of the signing key. Validation never touches
/// the key hierarchy.
pub struct CapabilityValidator<S: Store> {
    store: Arc<S>,
    verifying_key: Ed25519PublicKey,
}

impl<S: Store> CapabilityValidator<S> {
    pub fn new(store: Arc<S>, verifying_key: Ed25519PublicKey) -> Self {
        Self {
            store,
            verifying_key,
        }
    }

    /// Validate `token` at `now` (Unix ms) and consume one view.
    ///
    /// The stored row decides expiry, limits and revocation. The token only
    /// has to be authentic, of type `share`, and name the same owner and
    /// album as its row. A token failing any of these spends no view.
    pub async fn validate(&self, token: &CapabilityToken, now: i64) -> Result<CapabilityContext> {
        let hash = token.hash();

        let claims = token
            .verify(&self.verifying_key, TokenType::Share)
            .map_err(|e| {
                tracing::warn!(token = %hash, error = %e, "rejected share token");
                ShareError::InvalidCapability(e.to_string())
            })?;

        let row = match self
            .store
            .consume_view(&hash, &claims.sub, &claims.alb, now)
            .await?
        {
            ConsumeOutcome::Consumed(row) => row,
            ConsumeOutcome::Rejected(state) => {
                tracing::info!(token = %hash, state = state.as_str(), "share capability not active");
                return Err(ShareError::for_state(state));
            }
            ConsumeOutcome::Mismatched(row) => {
                tracing::error!(
                    capability = %row.id,
                    token_album = %claims.alb,
                    row_album = %row.album_id,
                    "share token claims disagree with stored capability"
                );
                return Err(ShareError::InvalidCapability(
                    "claims do not match capability".into(),
                ));
            }
            ConsumeOutcome::NotFound => {
                tracing::warn!(token = %hash, "no capability for authentic share token");
                return Err(ShareError::CapabilityNotFound);
            }
        };

        tracing::debug!(
            capability = %row.id,
            album = %row.album_id,
            view_count = row.view_count,
            "consumed share view"
        );

        Ok(CapabilityContext {
            capability_id: row.id,
            remaining_views: row.remaining_views(),
            view_count: row.view_count,
            expires_at: row.expires_at,
            owner: row.owner_id,
            album: row.album_id,
        })
    }

    /// Revoke a capability. Revoking twice is not an error.
    pub async fn revoke(&self, id: &CapabilityId) -> Result<()> {
        match self.store.revoke_capability(id).await? {
            RevokeOutcome::Revoked => {
                tracing::info!(capability = %id, "revoked share capability");
                Ok(())
            }
            RevokeOutcome::AlreadyRevoked => {
                tracing::debug!(capability = %id, "share capability already revoked");
                Ok(())
            }
            RevokeOutcome::NotFound => Err(ShareError::CapabilityNotFound),
        }
    }

    /// Snapshot of a capability at `now`. Does not consume a view.
    pub async fn stats(&self, id: &CapabilityId, now: i64) -> Result<CapabilityStats> {
        let row = self
            .store
            .get_capability(id)
            .await?
            .ok_or(ShareError::CapabilityNotFound)?;
        Ok(CapabilityStats::from_row(row, now))
    }

    /// Every capability `owner` has issued for `album`, oldest first.
    pub async fn list_for_album(
        &self,
        owner: &UserId,
        album: &AlbumId,
        now: i64,
    ) -> Result<Vec<CapabilityStats>> {
        let rows = self.store.list_capabilities(owner, album).await?;
        Ok(rows
            .into_iter()
            .map(|row| CapabilityStats::from_row(row, now))
            .collect())
    }
}
