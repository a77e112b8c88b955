//! Preparing, storing and opening end-to-end messages.
//!
//! A message for a peer is sealed under a fresh sender key pair and the
//! recipient's public key. Only the sender's ephemeral public key travels
//! with it, so the recipient can rederive the shared secret while the sender
//! keeps nothing secret around.

use qrpass_crypto::{KeyPair, PeerIdHash, compute_shared_b64};
use serde_json::Value;
use tracing::debug;

use crate::error::{NodeError, Result};
use crate::exchange::{Response, make_response};
use crate::storage::{Database, MessageDraft, StoredMessage};

/// A sealed message ready to be stored or shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMessage {
    pub to_peer_id_hash: PeerIdHash,
    pub ephemeral_public_key_b64: String,
    pub nonce_b64: String,
    pub ciphertext_b64: String,
}

impl PreparedMessage {
    pub fn to_response(&self) -> Result<Response> {
        Ok(make_response(
            &self.ephemeral_public_key_b64,
            &self.nonce_b64,
            &self.ciphertext_b64,
        )?)
    }
}

/// Seal `cleartext` for the holder of `recipient_public_b64`.
pub fn prepare_message(recipient_public_b64: &str, cleartext: &Value) -> Result<PreparedMessage> {
    let sender = KeyPair::generate();
    let shared = compute_shared_b64(recipient_public_b64, &sender)?;
    let sealed = shared.encrypt(cleartext)?;
    let to_peer_id_hash = PeerIdHash::derive_from_b64(recipient_public_b64)?;

    debug!(to = %to_peer_id_hash, "Message prepared");
    Ok(PreparedMessage {
        to_peer_id_hash,
        ephemeral_public_key_b64: sender.public_b64(),
        nonce_b64: sealed.nonce_b64(),
        ciphertext_b64: sealed.ciphertext_b64(),
    })
}

/// Persist a prepared message for later hand-off and return its id.
pub async fn store_prepared(
    db: &Database,
    prepared: &PreparedMessage,
    from: Option<&PeerIdHash>,
    cleartext_echo: Option<&Value>,
) -> Result<String> {
    let id = db
        .save_message(MessageDraft {
            id: None,
            to_peer_id_hash: prepared.to_peer_id_hash.to_string(),
            from_peer_id_hash: from.map(ToString::to_string),
            ephemeral_public_key_b64: prepared.ephemeral_public_key_b64.clone(),
            nonce_b64: prepared.nonce_b64.clone(),
            ciphertext_b64: prepared.ciphertext_b64.clone(),
            cleartext_echo: cleartext_echo.map(ToString::to_string),
        })
        .await?;
    Ok(id)
}

/// Open a message addressed to us using the sender's ephemeral public key.
pub fn decrypt_received(
    mine: &KeyPair,
    sender_epk_b64: &str,
    nonce_b64: &str,
    ciphertext_b64: &str,
) -> Result<Value> {
    let shared = compute_shared_b64(sender_epk_b64, mine)?;
    Ok(shared.decrypt_b64(nonce_b64, ciphertext_b64)?)
}

/// Open a stored message addressed to us.
pub fn decrypt_stored(mine: &KeyPair, message: &StoredMessage) -> Result<Value> {
    if !message.is_decryptable() {
        return Err(NodeError::Undeliverable(message.id.clone()));
    }
    decrypt_received(
        mine,
        &message.ephemeral_public_key_b64,
        &message.nonce_b64,
        &message.ciphertext_b64,
    )
}
