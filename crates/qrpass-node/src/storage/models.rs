//! Database models for QR-Pass.

use serde::{Deserialize, Serialize};

/// Ephemeral key value back-filled into rows written before the column existed.
pub const MISSING_EPHEMERAL_KEY: &str = "";

/// A peer we have seen, one row per distinct `peer_id_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Encounter {
    pub peer_id_hash: String,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
}

/// Message record from the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredMessage {
    pub id: String,
    pub to_peer_id_hash: String,
    pub from_peer_id_hash: Option<String>,
    pub ephemeral_public_key_b64: String,
    pub nonce_b64: String,
    pub ciphertext_b64: String,
    /// JSON text of the cleartext, kept by the sender for its own display.
    pub cleartext_echo: Option<String>,
    pub created_at: i64,
    pub delivered: bool,
    pub delivered_at: Option<i64>,
}

impl StoredMessage {
    /// Whether the recipient can rederive the shared secret for this message.
    ///
    /// Messages without an ephemeral key can still be handed on as opaque
    /// bytes but will never decrypt.
    pub fn is_decryptable(&self) -> bool {
        self.ephemeral_public_key_b64 != MISSING_EPHEMERAL_KEY
    }

    /// Parse the sender-side cleartext echo, if any.
    pub fn cleartext(&self) -> Option<serde_json::Value> {
        self.cleartext_echo
            .as_deref()
            .and_then(|text| serde_json::from_str(text).ok())
    }
}

/// Input for [`super::Database::save_message`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageDraft {
    /// Assigned (UUID v4) when absent.
    pub id: Option<String>,
    pub to_peer_id_hash: String,
    pub from_peer_id_hash: Option<String>,
    pub ephemeral_public_key_b64: String,
    pub nonce_b64: String,
    pub ciphertext_b64: String,
    pub cleartext_echo: Option<String>,
}

/// Filter for [`super::Database::list_messages`]. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub to_peer_id_hash: Option<String>,
    pub delivered: Option<bool>,
}

impl MessageFilter {
    /// Undelivered messages addressed to `peer_id_hash`.
    pub fn pending_for(peer_id_hash: &str) -> Self {
        Self {
            to_peer_id_hash: Some(peer_id_hash.to_string()),
            delivered: Some(false),
        }
    }
}
