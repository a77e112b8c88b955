//! Error types for the QR-Pass node.

use qrpass_crypto::CryptoError;

use crate::exchange::PayloadError;
use crate::storage::DatabaseError;

/// Errors surfaced by node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Core(#[from] qrpass_core::Error),

    /// Stored without an ephemeral key; can only be forwarded as opaque bytes.
    #[error("Message {0} has no ephemeral key and can never be decrypted")]
    Undeliverable(String),

    #[error("No beacon has been scanned to reply to")]
    NoBeaconScanned,
}

/// Result alias for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
