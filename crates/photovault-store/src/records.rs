//! Persisted record types.

use photovault_core::{AlbumId, CapabilityId, TokenHash, UserId, WrappedKey};

/// A user's data-encryption key, wrapped under the master key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserKeyRecord {
    pub user_id: UserId,
    pub wrapped_dek: WrappedKey,
    /// When the key was first generated (Unix ms).
    pub created_at: i64,
}

/// Lifecycle state of a share capability.
///
/// `Active` is the only state that permits a view. The other three are
/// terminal with respect to validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityState {
    Active,
    Expired,
    Revoked,
    Exhausted,
}

impl CapabilityState {
    pub fn is_active(self) -> bool {
        matches!(self, CapabilityState::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityState::Active => "active",
            CapabilityState::Expired => "expired",
            CapabilityState::Revoked => "revoked",
            CapabilityState::Exhausted => "exhausted",
        }
    }
}

/// Durable record of an issued share link.
///
/// Invariants upheld by every [`crate::Store`] implementation:
/// - `view_count` never decreases and never exceeds `max_views` when set
/// - `revoked` never goes back to `false`
/// - `expires_at` never changes after insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareCapability {
    pub id: CapabilityId,
    pub album_id: AlbumId,
    pub owner_id: UserId,
    pub token_hash: TokenHash,
    /// Unix ms.
    pub created_at: i64,
    /// Unix ms. The link is dead from this instant on.
    pub expires_at: i64,
    /// `None` means unlimited views.
    pub max_views: Option<u32>,
    pub view_count: u32,
    pub revoked: bool,
}

impl ShareCapability {
    /// Evaluate the state at `now` (Unix ms).
    ///
    /// Precedence is revoked, then expired, then exhausted.
    pub fn state(&self, now: i64) -> CapabilityState {
        if self.revoked {
            CapabilityState::Revoked
        } else if now >= self.expires_at {
            CapabilityState::Expired
        } else if self.max_views.is_some_and(|max| self.view_count >= max) {
            CapabilityState::Exhausted
        } else {
            CapabilityState::Active
        }
    }

    /// Views left before exhaustion, `None` if unlimited.
    pub fn remaining_views(&self) -> Option<u32> {
        self.max_views.map(|max| max.saturating_sub(self.view_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(max_views: Option<u32>, view_count: u32, revoked: bool) -> ShareCapability {
        ShareCapability {
            id: CapabilityId::from_bytes([1; 16]),
            album_id: AlbumId::new("a1"),
            owner_id: UserId::new("u1"),
            token_hash: TokenHash::from_bytes([2; 32]),
            created_at: 0,
            expires_at: 1_000,
            max_views,
            view_count,
            revoked,
        }
    }

    #[test]
    fn test_active_within_limits() {
        assert_eq!(capability(Some(2), 1, false).state(999), CapabilityState::Active);
        assert_eq!(capability(None, 10_000, false).state(0), CapabilityState::Active);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        assert_eq!(capability(None, 0, false).state(999), CapabilityState::Active);
        assert_eq!(capability(None, 0, false).state(1_000), CapabilityState::Expired);
    }

    #[test]
    fn test_expiry_dominates_remaining_views() {
        assert_eq!(capability(Some(5), 0, false).state(2_000), CapabilityState::Expired);
    }

    #[test]
    fn test_revoked_dominates_everything() {
        assert_eq!(capability(Some(1), 1, true).state(2_000), CapabilityState::Revoked);
    }

    #[test]
    fn test_exhausted_at_limit() {
        assert_eq!(capability(Some(2), 2, false).state(0), CapabilityState::Exhausted);
        assert_eq!(capability(Some(2), 2, false).remaining_views(), Some(0));
    }
}
