//! Database queries for QR-Pass.
//!
//! Every write is a single statement, so a record is either fully written or
//! not written at all.

use qrpass_core::db::unix_timestamp_millis;
use tracing::debug;

use super::db::{Database, DatabaseError};
use super::models::{Encounter, MessageDraft, MessageFilter, StoredMessage};

impl Database {
    // =========================================================================
    // Encounter queries
    // =========================================================================

    /// Record a sighting of `peer_id_hash` at `timestamp` (Unix millis).
    ///
    /// Inserts the encounter on first sight; afterwards only `last_seen_at`
    /// moves, and never backwards, so repeated or out-of-order sightings are
    /// harmless.
    pub async fn save_encounter(
        &self,
        peer_id_hash: &str,
        timestamp: i64,
    ) -> Result<Encounter, DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO encounters (peer_id_hash, first_seen_at, last_seen_at)
            VALUES (?, ?, ?)
            ON CONFLICT(peer_id_hash) DO UPDATE SET
                last_seen_at = MAX(last_seen_at, excluded.last_seen_at)
            ",
        )
        .bind(peer_id_hash)
        .bind(timestamp)
        .bind(timestamp)
        .execute(self.pool())
        .await?;

        debug!(peer_id_hash, timestamp, "Encounter saved");
        self.get_encounter(peer_id_hash).await
    }

    /// Get an encounter by peer id.
    pub async fn get_encounter(&self, peer_id_hash: &str) -> Result<Encounter, DatabaseError> {
        sqlx::query_as::<_, Encounter>("SELECT * FROM encounters WHERE peer_id_hash = ?")
            .bind(peer_id_hash)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Encounter {peer_id_hash}")))
    }

    /// List encounters, most recently seen first.
    pub async fn list_encounters(&self) -> Result<Vec<Encounter>, DatabaseError> {
        let encounters = sqlx::query_as::<_, Encounter>(
            "SELECT * FROM encounters ORDER BY last_seen_at DESC, peer_id_hash ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(encounters)
    }

    // =========================================================================
    // Message queries
    // =========================================================================

    /// Persist a message draft and return its id.
    ///
    /// `created_at` is set to now and `delivered` to false. Saving a draft
    /// whose id already exists keeps the original record untouched.
    pub async fn save_message(&self, draft: MessageDraft) -> Result<String, DatabaseError> {
        let id = draft
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = unix_timestamp_millis();

        let result = sqlx::query(
            r"
            INSERT INTO messages (
                id, to_peer_id_hash, from_peer_id_hash, ephemeral_public_key_b64,
                nonce_b64, ciphertext_b64, cleartext_echo, created_at, delivered
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(&id)
        .bind(&draft.to_peer_id_hash)
        .bind(&draft.from_peer_id_hash)
        .bind(&draft.ephemeral_public_key_b64)
        .bind(&draft.nonce_b64)
        .bind(&draft.ciphertext_b64)
        .bind(&draft.cleartext_echo)
        .bind(now)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            debug!(message_id = %id, "Message already stored, keeping original");
        } else {
            debug!(message_id = %id, to = %draft.to_peer_id_hash, "Message stored");
        }
        Ok(id)
    }

    /// Get a message by ID.
    pub async fn get_message(&self, id: &str) -> Result<StoredMessage, DatabaseError> {
        sqlx::query_as::<_, StoredMessage>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Message {id}")))
    }

    /// List messages matching `filter`, oldest first.
    ///
    /// Ties on `created_at` keep insertion order.
    pub async fn list_messages(
        &self,
        filter: &MessageFilter,
    ) -> Result<Vec<StoredMessage>, DatabaseError> {
        let messages = sqlx::query_as::<_, StoredMessage>(
            r"
            SELECT * FROM messages
            WHERE (?1 IS NULL OR to_peer_id_hash = ?1)
              AND (?2 IS NULL OR delivered = ?2)
            ORDER BY created_at ASC, rowid ASC
            ",
        )
        .bind(filter.to_peer_id_hash.as_deref())
        .bind(filter.delivered)
        .fetch_all(self.pool())
        .await?;

        Ok(messages)
    }

    /// Mark a message delivered.
    ///
    /// Unknown ids and already-delivered messages are left alone, so the
    /// first call's `delivered_at` sticks. Returns whether this call made
    /// the transition.
    pub async fn mark_delivered(&self, id: &str) -> Result<bool, DatabaseError> {
        let now = unix_timestamp_millis();

        let result = sqlx::query(
            "UPDATE messages SET delivered = 1, delivered_at = ? WHERE id = ? AND delivered = 0",
        )
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        let changed = result.rows_affected() > 0;
        debug!(message_id = id, changed, "Mark delivered");
        Ok(changed)
    }
}
