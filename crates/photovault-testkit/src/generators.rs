//! Proptest generators for property-based testing.

use proptest::prelude::*;

use photovault_core::{AlbumId, DataKey, ImageId, KeyVault, ObjectKind, SigningKeypair, UserId};
use photovault_share::IssueRequest;

/// Random data key.
pub fn data_key() -> impl Strategy<Value = DataKey> {
    any::<[u8; 32]>().prop_map(DataKey::from_bytes)
}

/// Master secret in direct form: exactly 64 hex characters.
pub fn hex_secret() -> impl Strategy<Value = String> {
    any::<[u8; 32]>().prop_map(hex::encode)
}

/// Master secret in passphrase form. Never 64 hex characters.
pub fn passphrase() -> impl Strategy<Value = String> {
    "[ -~]{1,80}".prop_filter("looks like a hex key", |s| {
        !(s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()))
    })
}

/// Either form of master secret.
pub fn secret() -> impl Strategy<Value = String> {
    prop_oneof![hex_secret(), passphrase()]
}

/// Vault built from a generated secret.
pub fn key_vault() -> impl Strategy<Value = KeyVault> {
    secret().prop_map(|s| KeyVault::from_secret(s).unwrap())
}

/// Deterministic signing keypair.
pub fn signing_keypair() -> impl Strategy<Value = SigningKeypair> {
    any::<[u8; 32]>().prop_map(|seed| SigningKeypair::from_seed(&seed))
}

pub fn object_kind() -> impl Strategy<Value = ObjectKind> {
    prop_oneof![Just(ObjectKind::Original), Just(ObjectKind::Thumbnail)]
}

/// Plaintext bytes of up to `max_len`.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

pub fn user_id() -> impl Strategy<Value = UserId> {
    "u[a-z0-9]{1,15}".prop_map(UserId::new)
}

pub fn album_id() -> impl Strategy<Value = AlbumId> {
    "a[a-z0-9]{1,15}".prop_map(AlbumId::new)
}

pub fn image_id() -> impl Strategy<Value = ImageId> {
    "i[a-z0-9]{1,15}".prop_map(ImageId::new)
}

/// A request the issuer accepts.
pub fn issue_request() -> impl Strategy<Value = IssueRequest> {
    (
        user_id(),
        album_id(),
        1u32..=24 * 365,
        prop::option::of(1u32..=1_000),
    )
        .prop_map(|(owner, album, ttl_hours, max_views)| IssueRequest {
            owner,
            album,
            ttl_hours,
            max_views,
        })
}
