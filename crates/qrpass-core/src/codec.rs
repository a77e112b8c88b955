//! Textual codec shared by every boundary where bytes leave the process.
//!
//! Keys, nonces and ciphertexts travel as unpadded base64url (QR payloads,
//! storage columns); cleartext objects travel as UTF-8 JSON.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Encode bytes as base64url without padding.
pub fn b64u_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode unpadded base64url.
///
/// Padding characters, the standard alphabet's `+`/`/` and non-canonical
/// trailing bits are all rejected.
pub fn b64u_decode(input: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|e| Error::Encoding(format!("invalid base64url: {e}")))
}

/// Whether `input` is a non-empty, well-formed base64url string.
pub fn is_base64url(input: &str) -> bool {
    !input.is_empty() && b64u_decode(input).is_ok()
}

/// Serialize a value to UTF-8 JSON bytes.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Parse UTF-8 JSON bytes.
///
/// Invalid UTF-8 and invalid JSON are both reported as [`Error::Encoding`].
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Encoding(format!("cleartext is not UTF-8: {e}")))?;
    serde_json::from_str(text).map_err(|e| Error::Encoding(format!("cleartext is not JSON: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_base64url() {
        let data = [0xfbu8, 0xff, 0x00, 0x10, 0x3e];
        let encoded = b64u_encode(&data);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(b64u_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn base64url_empty() {
        assert_eq!(b64u_encode(b""), "");
        assert!(b64u_decode("").unwrap().is_empty());
        assert!(!is_base64url(""));
    }

    #[test]
    fn padded_input_is_rejected() {
        assert!(b64u_decode("QQ==").is_err());
        assert!(b64u_decode("QQ").is_ok());
    }

    #[test]
    fn standard_alphabet_is_rejected() {
        assert!(!is_base64url("ab+/"));
        assert!(is_base64url("ab-_"));
    }

    #[test]
    fn garbage_is_not_base64url() {
        assert!(!is_base64url("not base64!"));
        assert!(matches!(b64u_decode("%%%"), Err(Error::Encoding(_))));
    }

    #[test]
    fn json_roundtrip() {
        let value = serde_json::json!({"note": "hello", "n": 3});
        let bytes = encode_json(&value).unwrap();
        let back: serde_json::Value = decode_json(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn decode_json_rejects_invalid_utf8() {
        let result: Result<serde_json::Value> = decode_json(&[0xff, 0xfe]);
        assert!(matches!(result, Err(Error::Encoding(_))));
    }

    #[test]
    fn decode_json_rejects_non_json() {
        let result: Result<serde_json::Value> = decode_json(b"not json");
        assert!(matches!(result, Err(Error::Encoding(_))));
    }
}
