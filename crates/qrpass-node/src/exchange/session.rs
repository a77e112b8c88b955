//! The device-side context of an exchange.
//!
//! An [`ExchangeSession`] owns the key pair behind the beacon this device is
//! showing. It is created by the caller and handed to every scan, so the
//! secret needed to open incoming responses is never hidden in a global.

use std::path::{Path, PathBuf};

use qrpass_crypto::{CryptoError, KeyPair, PeerIdHash};
use tracing::info;

use super::payload::{Beacon, PayloadError, make_beacon};

/// File name of the beacon key inside the keys directory.
pub const BEACON_KEY_FILE: &str = "beacon.key";

/// Key material for the beacon currently on display.
#[derive(Debug)]
pub struct ExchangeSession {
    keys: KeyPair,
    key_path: Option<PathBuf>,
}

impl ExchangeSession {
    /// A session whose key pair lives only in memory.
    ///
    /// Responses to its beacon cannot be opened after the process exits.
    pub fn ephemeral() -> Self {
        Self::from_key_pair(KeyPair::generate())
    }

    pub const fn from_key_pair(keys: KeyPair) -> Self {
        Self {
            keys,
            key_path: None,
        }
    }

    /// A session backed by an owner-only key file in `keys_dir`.
    ///
    /// Reuses the stored key pair when present so a response scanned after
    /// a restart can still be decrypted.
    pub fn open_persistent(keys_dir: &Path) -> Result<Self, CryptoError> {
        let path = keys_dir.join(BEACON_KEY_FILE);
        let keys = KeyPair::load_or_generate(&path)?;
        info!(peer_id_hash = %keys.peer_id_hash(), "Beacon key loaded");
        Ok(Self {
            keys,
            key_path: Some(path),
        })
    }

    /// Replace the beacon key pair.
    ///
    /// Responses addressed to the previous beacon become unreadable.
    pub fn rotate(&mut self) -> Result<(), CryptoError> {
        let keys = KeyPair::generate();
        if let Some(path) = &self.key_path {
            keys.save_to_file(path)?;
        }
        self.keys = keys;
        info!(peer_id_hash = %self.keys.peer_id_hash(), "Beacon key rotated");
        Ok(())
    }

    pub const fn key_pair(&self) -> &KeyPair {
        &self.keys
    }

    /// How peers will identify this device while the current beacon is shown.
    pub fn peer_id_hash(&self) -> PeerIdHash {
        self.keys.peer_id_hash()
    }

    /// The beacon payload to render.
    pub fn beacon(&self) -> Result<Beacon, PayloadError> {
        make_beacon(&self.keys.public_b64())
    }
}
