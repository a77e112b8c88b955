//! Scan classification state machine.
//!
//! Each decoded code is classified exactly once into a [`ScanOutcome`].
//! Payload problems are outcomes, not errors; only store I/O surfaces as
//! `Err`. The machine has no timers and is driven purely by scan events,
//! one at a time.

use std::time::Instant;

use qrpass_core::codec::b64u_decode;
use qrpass_core::db::unix_timestamp_millis;
use qrpass_crypto::{CryptoError, KEY_SIZE, PeerIdHash, compute_shared_b64};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::capture::CaptureEvent;
use super::gate::ScanGate;
use super::payload::{Beacon, Payload, PayloadError, Response, parse_payload};
use super::session::ExchangeSession;
use crate::error::{NodeError, Result};
use crate::gossip::DeliveryCoordinator;
use crate::service::{prepare_message, store_prepared};
use crate::storage::{Database, Encounter, StoredMessage};

/// Why a response could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptFailure {
    /// Wrong key or tampered ciphertext.
    Authentication,
    /// Authenticated, but the cleartext is not JSON.
    MalformedCleartext,
}

/// Result of handling one capture event.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Debounced duplicate or transient capture noise.
    Ignored,
    BeaconSeen {
        beacon: Beacon,
        peer_id_hash: PeerIdHash,
        encounter: Encounter,
        /// Stored messages waiting for this peer.
        pending: Vec<StoredMessage>,
    },
    Decrypted {
        peer_id_hash: PeerIdHash,
        cleartext: Value,
    },
    DecryptFailed(DecryptFailure),
    /// Key material of the wrong length or unusable for agreement.
    InvalidKeyMaterial(String),
    /// Well-formed JSON of an unknown shape or version.
    Unrecognized(String),
    /// Not JSON, or a known shape with broken base64url.
    Malformed(String),
    /// The capture side cannot work at all.
    CaptureUnavailable(String),
}

impl ScanOutcome {
    /// Short text for the person holding the device.
    ///
    /// `None` means nothing should be shown.
    pub const fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Ignored => None,
            Self::BeaconSeen { .. } => Some("Contact found. You can write them a note now."),
            Self::Decrypted { .. } => Some("Note received."),
            Self::DecryptFailed(DecryptFailure::Authentication) => {
                Some("Could not decrypt this note. It may be meant for someone else.")
            }
            Self::DecryptFailed(DecryptFailure::MalformedCleartext) => {
                Some("The note was unlocked but its contents could not be read.")
            }
            Self::InvalidKeyMaterial(_) => {
                Some("This code comes from an incompatible version of the app.")
            }
            Self::Unrecognized(_) => Some("This code is not a QR-Pass code."),
            Self::Malformed(_) => Some("This code is damaged or incomplete. Try scanning again."),
            Self::CaptureUnavailable(_) => {
                Some("The camera is not available. Check the app's camera permission.")
            }
        }
    }

    /// Stable label used in logs and CLI output.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::BeaconSeen { .. } => "beacon",
            Self::Decrypted { .. } => "decrypted",
            Self::DecryptFailed(_) => "decrypt_failed",
            Self::InvalidKeyMaterial(_) => "invalid_key_material",
            Self::Unrecognized(_) => "unrecognized",
            Self::Malformed(_) => "malformed",
            Self::CaptureUnavailable(_) => "capture_unavailable",
        }
    }
}

/// Where the scanning party stands after the last classified event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExchangeState {
    #[default]
    Idle,
    /// A beacon was scanned; the user may now reply to it.
    AwaitingUserResponse {
        peer_id_hash: PeerIdHash,
        epk_b64: String,
    },
    Decrypted,
    DecryptFailed,
    Unrecognized,
}

/// One device's side of the beacon/response exchange.
pub struct Exchange {
    db: Database,
    gossip: DeliveryCoordinator,
    gate: ScanGate,
    state: ExchangeState,
}

impl Exchange {
    pub fn new(db: Database, gate: ScanGate) -> Self {
        Self {
            gossip: DeliveryCoordinator::new(db.clone()),
            db,
            gate,
            state: ExchangeState::Idle,
        }
    }

    pub const fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub const fn gossip(&self) -> &DeliveryCoordinator {
        &self.gossip
    }

    /// Triage a capture event and classify it if it passes the gate.
    pub async fn handle_event(
        &mut self,
        session: &ExchangeSession,
        event: CaptureEvent,
        now: Instant,
    ) -> Result<ScanOutcome> {
        match event {
            CaptureEvent::Transient(reason) => {
                debug!(reason = %reason, "Transient capture error dropped");
                Ok(ScanOutcome::Ignored)
            }
            CaptureEvent::Fatal(reason) => {
                warn!(reason = %reason, "Capture unavailable");
                Ok(ScanOutcome::CaptureUnavailable(reason))
            }
            CaptureEvent::Decoded(text) => {
                if !self.gate.admit(now) {
                    return Ok(ScanOutcome::Ignored);
                }
                self.classify(session, &text).await
            }
        }
    }

    /// Classify decoded text, bypassing the rate gate.
    ///
    /// Safe to repeat for the same text: encounters are upserted and
    /// decryption has no side effects beyond that.
    pub async fn classify(&mut self, session: &ExchangeSession, text: &str) -> Result<ScanOutcome> {
        let outcome = match parse_payload(text) {
            Err(PayloadError::NotJson(reason)) => ScanOutcome::Malformed(reason),
            Err(err @ PayloadError::InvalidEncoding { .. }) => {
                ScanOutcome::Malformed(err.to_string())
            }
            Ok(Payload::Unrecognized(reason)) => ScanOutcome::Unrecognized(reason),
            Ok(Payload::Beacon(beacon)) => self.on_beacon(beacon).await?,
            Ok(Payload::Response(response)) => self.on_response(session, &response).await?,
        };

        self.state = match (&outcome, &self.state) {
            (ScanOutcome::BeaconSeen { beacon, peer_id_hash, .. }, _) => {
                ExchangeState::AwaitingUserResponse {
                    peer_id_hash: peer_id_hash.clone(),
                    epk_b64: beacon.epk_b64().to_string(),
                }
            }
            (ScanOutcome::Decrypted { .. }, _) => ExchangeState::Decrypted,
            (ScanOutcome::DecryptFailed(_), _) => ExchangeState::DecryptFailed,
            (
                ScanOutcome::Unrecognized(_)
                | ScanOutcome::Malformed(_)
                | ScanOutcome::InvalidKeyMaterial(_),
                _,
            ) => ExchangeState::Unrecognized,
            (ScanOutcome::Ignored | ScanOutcome::CaptureUnavailable(_), state) => state.clone(),
        };

        info!(kind = outcome.kind(), "Scan classified");
        Ok(outcome)
    }

    async fn on_beacon(&self, beacon: Beacon) -> Result<ScanOutcome> {
        let raw = match b64u_decode(beacon.epk_b64()) {
            Ok(raw) => raw,
            Err(e) => return Ok(ScanOutcome::Malformed(e.to_string())),
        };
        if raw.len() != KEY_SIZE {
            let err = CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: raw.len(),
            };
            return Ok(ScanOutcome::InvalidKeyMaterial(err.to_string()));
        }

        let peer_id_hash = PeerIdHash::derive(&raw);
        let encounter = self
            .db
            .save_encounter(peer_id_hash.as_str(), unix_timestamp_millis())
            .await?;
        let pending = self.gossip.pending_for(&peer_id_hash).await?;

        Ok(ScanOutcome::BeaconSeen {
            beacon,
            peer_id_hash,
            encounter,
            pending,
        })
    }

    async fn on_response(
        &self,
        session: &ExchangeSession,
        response: &Response,
    ) -> Result<ScanOutcome> {
        let opened = compute_shared_b64(response.epk_b64(), session.key_pair()).and_then(|shared| {
            shared.decrypt_b64(response.nonce_b64(), response.ciphertext_b64())
        });

        let cleartext = match opened {
            Ok(cleartext) => cleartext,
            Err(err) => return Self::crypto_outcome(err),
        };

        let peer_id_hash = PeerIdHash::derive_from_b64(response.epk_b64())?;
        self.db
            .save_encounter(peer_id_hash.as_str(), unix_timestamp_millis())
            .await?;

        Ok(ScanOutcome::Decrypted {
            peer_id_hash,
            cleartext,
        })
    }

    fn crypto_outcome(err: CryptoError) -> Result<ScanOutcome> {
        match &err {
            CryptoError::AuthenticationFailed => {
                Ok(ScanOutcome::DecryptFailed(DecryptFailure::Authentication))
            }
            CryptoError::MalformedCleartext(_) => {
                Ok(ScanOutcome::DecryptFailed(DecryptFailure::MalformedCleartext))
            }
            CryptoError::InvalidKeyLength { .. } | CryptoError::KeyDerivationFailed(_) => {
                Ok(ScanOutcome::InvalidKeyMaterial(err.to_string()))
            }
            CryptoError::InvalidNonceLength { .. } | CryptoError::InvalidEncoding(_) => {
                Ok(ScanOutcome::Malformed(err.to_string()))
            }
            _ => Err(NodeError::Crypto(err)),
        }
    }

    /// Seal `cleartext` for the beacon scanned last and store it.
    ///
    /// Returns the stored message id and the Response to render.
    pub async fn respond(
        &mut self,
        session: &ExchangeSession,
        cleartext: &Value,
    ) -> Result<(String, Response)> {
        let ExchangeState::AwaitingUserResponse { epk_b64, .. } = &self.state else {
            return Err(NodeError::NoBeaconScanned);
        };

        let prepared = prepare_message(epk_b64, cleartext)?;
        let id = store_prepared(
            &self.db,
            &prepared,
            Some(&session.peer_id_hash()),
            Some(cleartext),
        )
        .await?;
        let response = prepared.to_response()?;
        info!(message_id = %id, to = %prepared.to_peer_id_hash, "Response prepared");
        Ok((id, response))
    }
}
