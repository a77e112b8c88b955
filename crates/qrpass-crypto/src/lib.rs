//! QR-Pass E2E Encryption Library
//!
//! Provides the cryptographic primitives behind the beacon/response
//! exchange between two devices that only share a camera line of sight.
//!
//! ## Crypto primitives
//!
//! - **Keys**: X25519 key pair, generated fresh per exchange
//! - **Shared secret**: one X25519 ECDH per exchange, reusable for several messages
//! - **Encryption**: NaCl box (HSalsa20 key, XSalsa20-Poly1305), random 24-byte nonce
//! - **Peer identity**: SHA-256 of the raw public key truncated to 16 bytes, base64url

pub mod error;
pub mod identity;
pub mod keys;
pub mod session;

pub use error::CryptoError;
pub use identity::{PEER_ID_LEN, PeerIdHash};
pub use keys::{KEY_SIZE, KeyPair};
pub use session::{EncryptedData, NONCE_SIZE, SharedSecret, compute_shared, compute_shared_b64};
