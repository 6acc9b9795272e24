//! Key hierarchy: master key and per-user data-encryption keys.
//!
//! The [`KeyVault`] owns the server-wide master key. It is only ever used to
//! wrap and unwrap [`DataKey`]s, never to encrypt content directly. Each
//! user's content is encrypted under that user's own randomly generated
//! `DataKey`, so DEKs are mutually independent; anyone holding the master
//! secret can still unwrap all of them.

use std::fmt;

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::{self, SealedBlob};
use crate::error::{CoreError, Result};

/// Length of every symmetric key in the hierarchy.
pub const KEY_LEN: usize = 32;

/// blake3 `derive_key` context for turning a passphrase into a master key.
const MASTER_KEY_CONTEXT: &str = "photovault 2024-06 master key from passphrase";

/// blake3 `derive_key` context for the loggable master key fingerprint.
const FINGERPRINT_CONTEXT: &str = "photovault 2024-06 master key fingerprint";

/// Associated data bound into every wrapped DEK.
const WRAP_AAD: &[u8] = b"photovault/dek-wrap/v1";

/// A per-user data-encryption key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; KEY_LEN]);

impl DataKey {
    /// Generate a fresh random key. Every call is independent.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey(..)")
    }
}

impl PartialEq for DataKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for DataKey {}

/// A [`DataKey`] sealed under the master key, as persisted per user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Text form stored in the `wrapped_dek` column.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }
}

/// How the configured master secret was turned into a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// The secret was already a 256-bit key in hex form.
    Direct,
    /// The secret was an arbitrary passphrase and was hashed into a key.
    Derived,
    /// Random key generated for this process only.
    Ephemeral,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct MasterKey([u8; KEY_LEN]);

/// Holds the master key and wraps/unwraps data keys.
///
/// Immutable after construction and safe to share between tasks by
/// reference or `Arc`.
pub struct KeyVault {
    master: MasterKey,
    origin: KeyOrigin,
}

impl KeyVault {
    /// Build a vault from an operator-supplied secret.
    ///
    /// A secret of exactly 64 hex characters is used as the key directly.
    /// Anything else is treated as a passphrase and hashed into a key, so the
    /// same passphrase always yields the same key. The passphrase must carry
    /// enough entropy on its own; no stretching is applied.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(CoreError::KeyUnavailable("master secret is empty".into()));
        }

        if let Some(key) = parse_hex_key(secret) {
            return Ok(Self {
                master: MasterKey(key),
                origin: KeyOrigin::Direct,
            });
        }

        Ok(Self {
            master: MasterKey(blake3::derive_key(MASTER_KEY_CONTEXT, secret)),
            origin: KeyOrigin::Derived,
        })
    }

    /// Build a vault around a random key that lives only as long as this
    /// process. Anything wrapped under it is unreadable after a restart.
    pub fn ephemeral() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self {
            master: MasterKey(key),
            origin: KeyOrigin::Ephemeral,
        }
    }

    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    /// Short, one-way fingerprint of the master key, for startup logs.
    pub fn fingerprint(&self) -> String {
        let digest = blake3::derive_key(FINGERPRINT_CONTEXT, &self.master.0);
        hex::encode(&digest[..8])
    }

    /// Seal a data key under the master key.
    pub fn wrap(&self, key: &DataKey) -> Result<WrappedKey> {
        let blob = cipher::seal(&self.master.0, WRAP_AAD, key.as_bytes())?;
        Ok(WrappedKey(blob.to_bytes()))
    }

    /// Recover a data key sealed by [`KeyVault::wrap`].
    ///
    /// Fails with [`CoreError::KeyUnavailable`] if the master key differs
    /// from the one used to wrap, or if the wrapped bytes were altered.
    pub fn unwrap(&self, wrapped: &WrappedKey) -> Result<DataKey> {
        let unavailable =
            || CoreError::KeyUnavailable("wrapped key does not open under the active master key".into());

        let blob = SealedBlob::from_bytes(&wrapped.0).map_err(|_| unavailable())?;
        let mut plain = cipher::open(&self.master.0, WRAP_AAD, &blob).ok_or_else(unavailable)?;

        let result = <[u8; KEY_LEN]>::try_from(plain.as_slice())
            .map(DataKey)
            .map_err(|_| unavailable());
        plain.zeroize();
        result
    }
}

impl fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVault")
            .field("origin", &self.origin)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Accept `secret` as a key only if it is exactly 64 hex characters.
pub(crate) fn parse_hex_key(secret: &[u8]) -> Option<[u8; KEY_LEN]> {
    if secret.len() != KEY_LEN * 2 {
        return None;
    }
    let decoded = hex::decode(secret).ok()?;
    decoded.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_hex_secret_used_directly() {
        let vault = KeyVault::from_secret(HEX_KEY).unwrap();
        assert_eq!(vault.origin(), KeyOrigin::Direct);
    }

    #[test]
    fn test_passphrase_is_derived() {
        let vault = KeyVault::from_secret("correct horse battery staple, but longer").unwrap();
        assert_eq!(vault.origin(), KeyOrigin::Derived);
    }

    #[test]
    fn test_near_miss_hex_is_derived() {
        // 64 chars, but not hex
        let secret = "z".repeat(64);
        assert_eq!(KeyVault::from_secret(secret).unwrap().origin(), KeyOrigin::Derived);
        // hex, but 62 chars
        assert_eq!(
            KeyVault::from_secret(&HEX_KEY[..62]).unwrap().origin(),
            KeyOrigin::Derived
        );
    }

    #[test]
    fn test_derivation_contexts_exact() {
        assert_eq!(MASTER_KEY_CONTEXT, "photovault 2024-06 master key from passphrase");
        assert_eq!(FINGERPRINT_CONTEXT, "photovault 2024-06 master key fingerprint");
    }

    #[test]
    fn test_empty_secret_is_unavailable() {
        assert!(matches!(
            KeyVault::from_secret(""),
            Err(CoreError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = KeyVault::from_secret("some operator passphrase").unwrap();
        let b = KeyVault::from_secret("some operator passphrase").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let dek = DataKey::generate();
        let wrapped = a.wrap(&dek).unwrap();
        assert_eq!(b.unwrap(&wrapped).unwrap(), dek);
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let vault = KeyVault::from_secret(HEX_KEY).unwrap();
        let dek = DataKey::generate();

        let wrapped = vault.wrap(&dek).unwrap();
        assert_ne!(wrapped.as_bytes(), dek.as_bytes());
        assert_eq!(vault.unwrap(&wrapped).unwrap(), dek);
    }

    #[test]
    fn test_wrapped_key_hex_roundtrip() {
        let vault = KeyVault::ephemeral();
        let wrapped = vault.wrap(&DataKey::generate()).unwrap();
        assert_eq!(WrappedKey::from_hex(&wrapped.to_hex()).unwrap(), wrapped);
    }

    #[test]
    fn test_tampered_wrapped_key_fails() {
        let vault = KeyVault::ephemeral();
        let mut bytes = vault.wrap(&DataKey::generate()).unwrap().as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(matches!(
            vault.unwrap(&WrappedKey::from_bytes(bytes)),
            Err(CoreError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn test_generated_keys_are_independent() {
        assert_ne!(DataKey::generate(), DataKey::generate());
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let dek = DataKey::from_bytes([0xab; 32]);
        assert!(!format!("{:?}", dek).contains("ab"));
    }

    proptest! {
        #[test]
        fn prop_wrap_roundtrip(secret in "[ -~]{1,80}", dek: [u8; 32]) {
            let vault = KeyVault::from_secret(&secret).unwrap();
            let dek = DataKey::from_bytes(dek);
            let wrapped = vault.wrap(&dek).unwrap();
            prop_assert_eq!(vault.unwrap(&wrapped).unwrap(), dek);
        }

        #[test]
        fn prop_cross_secret_fails(a in "[ -~]{1,64}", b in "[ -~]{1,64}") {
            prop_assume!(a != b);
            let vault_a = KeyVault::from_secret(&a).unwrap();
            let vault_b = KeyVault::from_secret(&b).unwrap();

            let wrapped = vault_a.wrap(&DataKey::generate()).unwrap();
            prop_assert!(matches!(vault_b.unwrap(&wrapped), Err(CoreError::KeyUnavailable(_))));
        }
    }
}
