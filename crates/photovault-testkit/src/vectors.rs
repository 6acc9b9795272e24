//! Format vectors for pinning the externally visible encodings.
//!
//! Anything a deployment persists or hands out must stay stable across
//! releases: the master key derived from a configured secret (otherwise
//! every wrapped DEK becomes unreadable) and the share token layout
//! (otherwise issued links stop validating). These vectors are computed
//! from fixed inputs and can be exported as JSON for other
//! implementations to check against.

use serde::{Deserialize, Serialize};

use photovault_core::{
    AlbumId, CapabilityClaims, KeyOrigin, KeyVault, SigningKeypair, TokenType, UserId,
};

/// How a configured secret maps to a master key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterKeyVector {
    pub name: String,
    pub secret: String,
    /// `direct` or `derived`.
    pub origin: String,
    pub fingerprint: String,
}

/// A share token signed from fixed inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenVector {
    pub name: String,
    pub signing_seed: String,
    pub public_key: String,
    pub owner: String,
    pub album: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    /// `hex(cbor(claims)).hex(signature)`
    pub token: String,
    pub token_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVectors {
    pub master_keys: Vec<MasterKeyVector>,
    pub tokens: Vec<TokenVector>,
}

fn master_key_vector(name: &str, secret: &str) -> MasterKeyVector {
    let vault = KeyVault::from_secret(secret).unwrap();
    MasterKeyVector {
        name: name.to_string(),
        secret: secret.to_string(),
        origin: match vault.origin() {
            KeyOrigin::Direct => "direct",
            KeyOrigin::Derived => "derived",
            KeyOrigin::Ephemeral => "ephemeral",
        }
        .to_string(),
        fingerprint: vault.fingerprint(),
    }
}

fn token_vector(name: &str, seed: [u8; 32], owner: &str, album: &str, jti: [u8; 16]) -> TokenVector {
    let keypair = SigningKeypair::from_seed(&seed);
    let claims = CapabilityClaims {
        typ: TokenType::Share.as_str().to_string(),
        sub: UserId::new(owner),
        alb: AlbumId::new(album),
        iat: 1_717_200_000,
        exp: 1_717_200_000 + 24 * 3_600,
        jti,
    };
    let token = claims.sign(&keypair).unwrap();

    TokenVector {
        name: name.to_string(),
        signing_seed: hex::encode(seed),
        public_key: keypair.public_key().to_hex(),
        owner: owner.to_string(),
        album: album.to_string(),
        iat: claims.iat,
        exp: claims.exp,
        jti: hex::encode(jti),
        token_hash: token.hash().to_hex(),
        token: token.into_string(),
    }
}

/// Every vector, computed with the current code.
pub fn all_vectors() -> FormatVectors {
    FormatVectors {
        master_keys: vec![
            master_key_vector(
                "direct_hex",
                "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            ),
            master_key_vector(
                "direct_hex_uppercase",
                "000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F",
            ),
            master_key_vector("passphrase", "correct horse battery staple"),
            master_key_vector(
                "hex_too_short",
                "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e",
            ),
        ],
        tokens: vec![
            token_vector("zero_seed", [0u8; 32], "u1", "a1", [0u8; 16]),
            token_vector("patterned", [0x42; 32], "alice", "holiday-2024", [0xa5; 16]),
        ],
    }
}

/// Vectors as pretty-printed JSON.
pub fn to_json() -> String {
    serde_json::to_string_pretty(&all_vectors()).unwrap()
}

/// Recompute every vector in `expected` and return the names that differ.
pub fn mismatches(expected: &FormatVectors) -> Vec<String> {
    let actual = all_vectors();
    let mut names = Vec::new();

    for vector in &expected.master_keys {
        let recomputed = master_key_vector(&vector.name, &vector.secret);
        if &recomputed != vector {
            names.push(vector.name.clone());
        }
    }
    for vector in &expected.tokens {
        if !actual.tokens.contains(vector) {
            names.push(vector.name.clone());
        }
    }

    names
}
