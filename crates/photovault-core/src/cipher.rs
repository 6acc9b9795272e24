//! Authenticated content encryption.
//!
//! Every stored object (original image, thumbnail) is sealed independently
//! under its owner's [`DataKey`] with ChaCha20-Poly1305 and a fresh random
//! nonce. The resulting blob is self-contained:
//!
//! ```text
//! format (1) || nonce (12) || ciphertext || tag (16)
//! ```
//!
//! Decryption either returns the complete plaintext or fails with
//! [`CoreError::DecryptionIntegrity`]. There is no partial output.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use crate::error::{CoreError, Result};
use crate::keys::DataKey;

/// Nonce length for ChaCha20-Poly1305.
pub const NONCE_LEN: usize = 12;

/// Poly1305 tag length.
pub const TAG_LEN: usize = 16;

/// Format identifier stored in the first byte of every blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlobFormat {
    /// ChaCha20-Poly1305 with a 256-bit key and 96-bit random nonce.
    ChaCha20Poly1305 = 1,
}

impl BlobFormat {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(BlobFormat::ChaCha20Poly1305),
            _ => None,
        }
    }
}

/// Which kind of object a blob holds.
///
/// Bound into the associated data, so a thumbnail blob cannot be served
/// in place of an original (or the other way round).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Original,
    Thumbnail,
}

impl ObjectKind {
    fn associated_data(self) -> &'static [u8] {
        match self {
            ObjectKind::Original => b"photovault/object/original/v1",
            ObjectKind::Thumbnail => b"photovault/object/thumbnail/v1",
        }
    }
}

/// A sealed, self-contained ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlob {
    pub format: BlobFormat,
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl SealedBlob {
    /// Serialize to the on-disk layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + NONCE_LEN + self.ciphertext.len());
        out.push(self.format as u8);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the on-disk layout.
    ///
    /// Anything that is not a well-formed blob is reported as an integrity
    /// failure; a truncated or relabelled blob is indistinguishable from a
    /// tampered one.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(CoreError::DecryptionIntegrity);
        }
        let format = BlobFormat::from_u8(bytes[0]).ok_or(CoreError::DecryptionIntegrity)?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[1..1 + NONCE_LEN]);

        Ok(Self {
            format,
            nonce,
            ciphertext: bytes[1 + NONCE_LEN..].to_vec(),
        })
    }

    /// Total encoded length.
    pub fn encoded_len(&self) -> usize {
        1 + NONCE_LEN + self.ciphertext.len()
    }
}

/// Seal `plaintext` under a raw 256-bit key.
///
/// Shared by the content cipher and by key wrapping in [`crate::keys`].
pub(crate) fn seal(key: &[u8; 32], aad: &[u8], plaintext: &[u8]) -> Result<SealedBlob> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CoreError::Encryption(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CoreError::Encryption(e.to_string()))?;

    Ok(SealedBlob {
        format: BlobFormat::ChaCha20Poly1305,
        nonce,
        ciphertext,
    })
}

/// Open a blob sealed by [`seal`]. Returns `None` on any failure.
pub(crate) fn open(key: &[u8; 32], aad: &[u8], blob: &SealedBlob) -> Option<Vec<u8>> {
    match blob.format {
        BlobFormat::ChaCha20Poly1305 => {
            let cipher = ChaCha20Poly1305::new_from_slice(key).ok()?;
            cipher
                .decrypt(
                    Nonce::from_slice(&blob.nonce),
                    Payload {
                        msg: &blob.ciphertext,
                        aad,
                    },
                )
                .ok()
        }
    }
}

/// Encrypts and decrypts stored objects under one user's [`DataKey`].
///
/// Holds a borrowed key only; construct one per request from the key
/// returned by the key manager.
pub struct ContentCipher<'a> {
    key: &'a DataKey,
}

impl<'a> ContentCipher<'a> {
    pub fn new(key: &'a DataKey) -> Self {
        Self { key }
    }

    /// Seal an object. Encrypting identical plaintext twice yields
    /// different blobs.
    pub fn encrypt(&self, kind: ObjectKind, plaintext: &[u8]) -> Result<Vec<u8>> {
        let blob = seal(self.key.as_bytes(), kind.associated_data(), plaintext)?;
        Ok(blob.to_bytes())
    }

    /// Open an object sealed by [`ContentCipher::encrypt`].
    pub fn decrypt(&self, kind: ObjectKind, blob: &[u8]) -> Result<Vec<u8>> {
        let blob = SealedBlob::from_bytes(blob)?;
        open(self.key.as_bytes(), kind.associated_data(), &blob)
            .ok_or(CoreError::DecryptionIntegrity)
    }
}
