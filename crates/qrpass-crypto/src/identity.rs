//! Peer identity derivation.
//!
//! A peer is identified by what it shows us: its public key. The identifier
//! is the SHA-256 digest of the raw key truncated to 128 bits and base64url
//! encoded. Two parties presenting the same key are the same peer.

use qrpass_core::codec::{b64u_decode, b64u_encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Number of digest bytes kept in a [`PeerIdHash`].
pub const PEER_ID_LEN: usize = 16;

/// Stable, non-reversible identifier of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerIdHash(String);

impl PeerIdHash {
    /// Derive the identifier from raw public key bytes.
    pub fn derive(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        Self(b64u_encode(&digest[..PEER_ID_LEN]))
    }

    /// Derive the identifier from a base64url-encoded public key.
    pub fn derive_from_b64(public_key_b64: &str) -> Result<Self, CryptoError> {
        let raw =
            b64u_decode(public_key_b64).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Ok(Self::derive(&raw))
    }

    /// Wrap an identifier read back from storage or typed by a user.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerIdHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PeerIdHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
