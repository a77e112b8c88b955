//! Store-and-forward delivery decisions.
//!
//! The coordinator decides which stored messages may go to a peer that has
//! just been identified and records hand-offs. How the messages actually
//! reach the peer (further codes on screen, for instance) is up to the
//! caller.

use qrpass_crypto::PeerIdHash;
use tracing::{debug, info};

use crate::exchange::Response;
use crate::storage::{Database, DatabaseError, MessageFilter, StoredMessage};

/// Picks pending messages for peers and commits delivery acknowledgements.
#[derive(Clone)]
pub struct DeliveryCoordinator {
    db: Database,
}

impl DeliveryCoordinator {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Undelivered messages addressed to `peer`, oldest first.
    pub async fn pending_for(
        &self,
        peer: &PeerIdHash,
    ) -> Result<Vec<StoredMessage>, DatabaseError> {
        let pending = self
            .db
            .list_messages(&MessageFilter::pending_for(peer.as_str()))
            .await?;
        debug!(peer_id_hash = %peer, count = pending.len(), "Pending messages");
        Ok(pending)
    }

    /// Record that the peer received message `id`.
    ///
    /// Call only once the transport has confirmed the hand-off. Repeated
    /// calls and unknown ids are no-ops.
    pub async fn acknowledge(&self, id: &str) -> Result<bool, DatabaseError> {
        let changed = self.db.mark_delivered(id).await?;
        if changed {
            info!(message_id = id, "Message delivered");
        }
        Ok(changed)
    }
}

impl StoredMessage {
    /// Present the message as a Response payload for the rendering surface.
    ///
    /// `None` when the stored fields do not form a valid response, which is
    /// always the case for messages missing their ephemeral key.
    pub fn as_response(&self) -> Option<Response> {
        if !self.is_decryptable() {
            return None;
        }
        crate::exchange::make_response(
            &self.ephemeral_public_key_b64,
            &self.nonce_b64,
            &self.ciphertext_b64,
        )
        .ok()
    }
}
