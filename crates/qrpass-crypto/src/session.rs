//! Shared secret and authenticated encryption.
//!
//! One X25519 ECDH per exchange produces a [`SharedSecret`] that can seal
//! any number of messages within the exchange. Sealing is NaCl `crypto_box`:
//! the box key is HSalsa20 of the ECDH output (`box.before`) and messages are
//! XSalsa20-Poly1305 with a random 24-byte nonce (`box.after`). Payloads
//! therefore interoperate with tweetnacl and libsodium peers.

use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Key, Nonce, XSalsa20Poly1305};
use qrpass_core::codec::{b64u_decode, b64u_encode, decode_json, encode_json};
use rand::RngCore;
use rand::rngs::OsRng;
use salsa20::cipher::consts::U10;
use salsa20::cipher::generic_array::GenericArray;
use salsa20::hsalsa;
use serde::Serialize;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::keys::{KEY_SIZE, KeyPair, to_key_array};

/// Nonce size for XSalsa20-Poly1305.
pub const NONCE_SIZE: usize = 24;

/// Sealed payload with the nonce needed to open it.
#[derive(Debug, Clone)]
pub struct EncryptedData {
    /// NaCl box ciphertext: 16-byte Poly1305 tag followed by the encrypted bytes.
    pub ciphertext: Vec<u8>,
    /// 24-byte nonce used for this encryption.
    pub nonce: [u8; NONCE_SIZE],
}

impl EncryptedData {
    pub fn nonce_b64(&self) -> String {
        b64u_encode(&self.nonce)
    }

    pub fn ciphertext_b64(&self) -> String {
        b64u_encode(&self.ciphertext)
    }
}

/// Raw 32-byte X25519 output, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: [u8; KEY_SIZE],
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for SharedSecret {}

/// X25519 ECDH between their public key and our secret key.
///
/// Both inputs must be exactly 32 bytes.
pub fn compute_shared(
    their_public: &[u8],
    my_secret: &[u8],
) -> Result<SharedSecret, CryptoError> {
    let public = PublicKey::from(to_key_array(their_public)?);
    let mut secret_bytes = to_key_array(my_secret)?;
    let secret = StaticSecret::from(secret_bytes);
    secret_bytes.zeroize();
    SharedSecret::agree(&secret, &public)
}

/// ECDH against a base64url public key taken from a payload.
pub fn compute_shared_b64(
    their_public_b64: &str,
    mine: &KeyPair,
) -> Result<SharedSecret, CryptoError> {
    let raw =
        b64u_decode(their_public_b64).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
    let public = PublicKey::from(to_key_array(&raw)?);
    SharedSecret::agree(mine.secret(), &public)
}

impl SharedSecret {
    fn agree(secret: &StaticSecret, public: &PublicKey) -> Result<Self, CryptoError> {
        let shared = secret.diffie_hellman(public);
        // A low-order public key forces an all-zero output regardless of our secret.
        if !shared.was_contributory() {
            return Err(CryptoError::KeyDerivationFailed(
                "public key is a low-order point".to_string(),
            ));
        }
        Ok(Self {
            bytes: *shared.as_bytes(),
        })
    }

    /// Wrap a raw 32-byte shared secret.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            bytes: to_key_array(bytes)?,
        })
    }

    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// The NaCl `box.before` key: HSalsa20 of the ECDH output with a zero input block.
    fn box_key(&self) -> Key {
        hsalsa::<U10>(GenericArray::from_slice(&self.bytes), &GenericArray::default())
    }

    fn cipher(&self) -> XSalsa20Poly1305 {
        let mut key = self.box_key();
        let cipher = XSalsa20Poly1305::new(&key);
        key.as_mut_slice().zeroize();
        cipher
    }

    /// Serialize `cleartext` to UTF-8 JSON and seal it under a fresh random nonce.
    pub fn encrypt<T: Serialize + ?Sized>(
        &self,
        cleartext: &T,
    ) -> Result<EncryptedData, CryptoError> {
        let mut plaintext =
            encode_json(cleartext).map_err(|e| CryptoError::SerializationError(e.to_string()))?;
        let sealed = self.seal(&plaintext);
        plaintext.zeroize();
        sealed
    }

    /// Seal raw bytes under a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedData, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(EncryptedData { ciphertext, nonce })
    }

    /// Open a sealed payload and return the raw cleartext bytes.
    ///
    /// Returns [`CryptoError::AuthenticationFailed`] on a wrong key or any
    /// tampering with the nonce or ciphertext.
    pub fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength {
                expected: NONCE_SIZE,
                actual: nonce.len(),
            });
        }
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Open a sealed payload and parse its JSON cleartext.
    ///
    /// Authentication failures and malformed cleartext are distinct errors:
    /// the former means "wrong key or tampered", the latter means the peer
    /// sealed something that is not JSON.
    pub fn decrypt(
        &self,
        nonce: &[u8],
        ciphertext: &[u8],
    ) -> Result<serde_json::Value, CryptoError> {
        let mut plaintext = self.open(nonce, ciphertext)?;
        let parsed =
            decode_json(&plaintext).map_err(|e| CryptoError::MalformedCleartext(e.to_string()));
        plaintext.zeroize();
        parsed
    }

    /// [`Self::decrypt`] for base64url-encoded nonce and ciphertext.
    pub fn decrypt_b64(
        &self,
        nonce_b64: &str,
        ciphertext_b64: &str,
    ) -> Result<serde_json::Value, CryptoError> {
        let nonce =
            b64u_decode(nonce_b64).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        let ciphertext =
            b64u_decode(ciphertext_b64).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        self.decrypt(&nonce, &ciphertext)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn shared_pair() -> (SharedSecret, SharedSecret) {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let ab = compute_shared(&b.public_bytes(), &a.secret_bytes()).unwrap();
        let ba = compute_shared(&a.public_bytes(), &b.secret_bytes()).unwrap();
        (ab, ba)
    }

    fn hex32(s: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).unwrap();
        }
        out
    }

    #[test]
    fn box_key_matches_nacl_before() {
        // RFC 7748 section 6.1 keys; box key is the NaCl `firstkey` vector.
        let alice_secret = hex32("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a");
        let bob_public = hex32("de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f");
        let shared = compute_shared(&bob_public, &alice_secret).unwrap();
        assert_eq!(
            shared.as_bytes(),
            &hex32("4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742")
        );
        assert_eq!(
            shared.box_key().as_slice(),
            &hex32("1b27556473e985d462cd51197a9a46c76009549eac6474f206c4ee0844f68389")[..]
        );
    }

    #[test]
    fn sealed_payload_carries_poly1305_overhead() {
        let (ab, _) = shared_pair();
        let sealed = ab.seal(b"\"hi\"").unwrap();
        assert_eq!(sealed.ciphertext.len(), 4 + 16);
        assert_eq!(sealed.nonce.len(), NONCE_SIZE);
    }

    #[test]
    fn ecdh_shared_secret_is_symmetric() {
        for _ in 0..16 {
            let (ab, ba) = shared_pair();
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn compute_shared_b64_matches_raw() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let raw = compute_shared(&b.public_bytes(), &a.secret_bytes()).unwrap();
        let from_b64 = compute_shared_b64(&b.public_b64(), &a).unwrap();
        assert_eq!(raw, from_b64);
    }

    #[test]
    fn compute_shared_rejects_short_public_key() {
        let a = KeyPair::generate();
        let result = compute_shared(&[9u8; 31], &a.secret_bytes());
        assert!(matches!(
            result,
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 31
            })
        ));
    }

    #[test]
    fn compute_shared_rejects_long_secret_key() {
        let a = KeyPair::generate();
        let result = compute_shared(&a.public_bytes(), &[1u8; 64]);
        assert!(matches!(
            result,
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 64
            })
        ));
    }

    #[test]
    fn compute_shared_rejects_low_order_point() {
        let a = KeyPair::generate();
        let result = compute_shared(&[0u8; 32], &a.secret_bytes());
        assert!(matches!(result, Err(CryptoError::KeyDerivationFailed(_))));
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let (ab, ba) = shared_pair();
        let values = [
            json!("hello"),
            json!({"from": "alice", "note": "meet at noon", "at": 1_700_000_000}),
            json!([1, 2, 3]),
            json!(null),
            json!(""),
        ];
        for value in values {
            let sealed = ab.encrypt(&value).unwrap();
            assert_eq!(ba.decrypt(&sealed.nonce, &sealed.ciphertext).unwrap(), value);
        }
    }

    #[test]
    fn shared_secret_is_reusable_within_exchange() {
        let (ab, ba) = shared_pair();
        let first = ab.encrypt("one").unwrap();
        let second = ab.encrypt("two").unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_eq!(ba.decrypt(&first.nonce, &first.ciphertext).unwrap(), json!("one"));
        assert_eq!(ba.decrypt(&second.nonce, &second.ciphertext).unwrap(), json!("two"));
    }

    #[test]
    fn every_bit_flip_is_detected() {
        let (ab, ba) = shared_pair();
        let sealed = ab.encrypt("hi").unwrap();
        for i in 0..sealed.ciphertext.len() * 8 {
            let mut tampered = sealed.ciphertext.clone();
            tampered[i / 8] ^= 1 << (i % 8);
            let result = ba.decrypt(&sealed.nonce, &tampered);
            assert!(
                matches!(result, Err(CryptoError::AuthenticationFailed)),
                "bit {i} flip not detected: {result:?}"
            );
        }
    }

    #[test]
    fn tampered_nonce_is_detected() {
        let (ab, ba) = shared_pair();
        let mut sealed = ab.encrypt("hi").unwrap();
        sealed.nonce[0] ^= 0x01;
        assert!(matches!(
            ba.decrypt(&sealed.nonce, &sealed.ciphertext),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn decrypt_with_wrong_key_fails_authentication() {
        let (ab, _) = shared_pair();
        let (_, unrelated) = shared_pair();
        let sealed = ab.encrypt("secret").unwrap();
        let err = unrelated.decrypt(&sealed.nonce, &sealed.ciphertext).unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn non_json_cleartext_is_malformed_not_auth_failure() {
        let (ab, ba) = shared_pair();
        let sealed = ab.seal(b"plain words, not json").unwrap();
        let err = ba.decrypt(&sealed.nonce, &sealed.ciphertext).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedCleartext(_)));
        assert!(!err.is_authentication_failure());
    }

    #[test]
    fn decrypt_rejects_wrong_nonce_length() {
        let (_, ba) = shared_pair();
        assert!(matches!(
            ba.decrypt(&[0u8; 12], b"whatever"),
            Err(CryptoError::InvalidNonceLength {
                expected: NONCE_SIZE,
                actual: 12
            })
        ));
    }

    #[test]
    fn decrypt_empty_ciphertext_fails_authentication() {
        let (_, ba) = shared_pair();
        assert!(matches!(
            ba.decrypt(&[0u8; NONCE_SIZE], &[]),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn decrypt_b64_roundtrip_and_bad_encoding() {
        let (ab, ba) = shared_pair();
        let sealed = ab.encrypt(&json!({"note": "b64"})).unwrap();
        let opened = ba
            .decrypt_b64(&sealed.nonce_b64(), &sealed.ciphertext_b64())
            .unwrap();
        assert_eq!(opened, json!({"note": "b64"}));

        assert!(matches!(
            ba.decrypt_b64("!!", &sealed.ciphertext_b64()),
            Err(CryptoError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn from_bytes_produces_same_box_key() {
        let secret = [42u8; 32];
        let s1 = SharedSecret::from_bytes(&secret).unwrap();
        let s2 = SharedSecret::from_bytes(&secret).unwrap();
        let sealed = s1.encrypt("same").unwrap();
        assert_eq!(s2.decrypt(&sealed.nonce, &sealed.ciphertext).unwrap(), json!("same"));
    }

    #[test]
    fn debug_redacts_shared_secret() {
        let s = SharedSecret::from_bytes(&[42u8; 32]).unwrap();
        assert_eq!(format!("{s:?}"), "SharedSecret([REDACTED])");
    }
}
