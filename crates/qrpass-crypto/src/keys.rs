//! X25519 key pairs.
//!
//! A fresh key pair is generated for every exchange. The secret half is
//! never written to the message store; when a pending exchange has to
//! survive a restart it is kept in its own owner-only key file.

use std::path::Path;

use qrpass_core::codec::b64u_encode;
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::identity::PeerIdHash;

/// Length of X25519 public and secret keys.
pub const KEY_SIZE: usize = 32;

/// An X25519 key pair owned by the party that generated it.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_b64())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a new key pair from the OS random source.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Reconstruct from raw 32-byte secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut arr = to_key_array(bytes)?;
        let secret = StaticSecret::from(arr);
        let public = PublicKey::from(&secret);
        arr.zeroize();
        Ok(Self { secret, public })
    }

    /// Get the public key as raw bytes.
    pub fn public_bytes(&self) -> [u8; KEY_SIZE] {
        *self.public.as_bytes()
    }

    /// Get the public key as unpadded base64url, the form carried in payloads.
    pub fn public_b64(&self) -> String {
        b64u_encode(self.public.as_bytes())
    }

    /// Get the secret key as raw bytes. Handle with care.
    pub fn secret_bytes(&self) -> [u8; KEY_SIZE] {
        self.secret.to_bytes()
    }

    /// Get the secret key reference for ECDH.
    pub const fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    /// Peer identifier other devices will derive from our public key.
    pub fn peer_id_hash(&self) -> PeerIdHash {
        PeerIdHash::derive(self.public.as_bytes())
    }

    /// Save the secret key to a file with restrictive permissions.
    ///
    /// The key is written to a sibling temp file and renamed over `path`, so
    /// an interrupted save leaves the previous key file intact.
    pub fn save_to_file(&self, path: &Path) -> Result<(), CryptoError> {
        use std::io::Write;

        let dir = path.parent().ok_or_else(|| {
            CryptoError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no parent directory",
            ))
        })?;
        std::fs::create_dir_all(dir)?;

        let temp_path = path.with_extension("tmp");
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&temp_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // A leftover temp file keeps its old mode when reopened.
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        let mut bytes = self.secret_bytes();
        let written = file.write_all(&bytes).and_then(|()| file.sync_all());
        bytes.zeroize();
        written?;
        drop(file);

        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Load a key pair from a file containing the 32-byte secret key.
    ///
    /// On Unix, refuses files readable by anyone but the owner.
    pub fn load_from_file(path: &Path) -> Result<Self, CryptoError> {
        use std::io::Read;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = std::fs::metadata(path)?;
            let mode = metadata.permissions().mode() & 0o777;
            if mode != 0o600 {
                return Err(CryptoError::IoError(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("Key file has insecure permissions: {mode:o} (expected 600)"),
                )));
            }
        }

        let mut file = std::fs::File::open(path)?;
        let mut buf = [0u8; KEY_SIZE];
        file.read_exact(&mut buf)?;
        let result = Self::from_secret_bytes(&buf);
        buf.zeroize();
        result
    }

    /// Load from file, or generate a new key pair and save it.
    pub fn load_or_generate(path: &Path) -> Result<Self, CryptoError> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            let kp = Self::generate();
            kp.save_to_file(path)?;
            Ok(kp)
        }
    }
}

/// Copy a slice into a fixed key array, rejecting any other length.
pub(crate) fn to_key_array(bytes: &[u8]) -> Result<[u8; KEY_SIZE], CryptoError> {
    <[u8; KEY_SIZE]>::try_from(bytes).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: bytes.len(),
    })
}
