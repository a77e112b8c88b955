//! Beacon and Response wire payloads.
//!
//! Payloads are JSON carried as QR text:
//!
//! ```text
//! {"type":"beacon","epk_b64":"…","v":1}
//! {"type":"response","epk_b64":"…","nonce_b64":"…","ciphertext_b64":"…","v":1}
//! ```
//!
//! Every `*_b64` field is unpadded base64url and is validated when the
//! payload is built, so a [`Beacon`] or [`Response`] value is always well
//! formed. [`parse_payload`] is the only way decoded text becomes a typed
//! payload.

use qrpass_core::codec::is_base64url;
use serde::Serialize;
use serde_json::{Map, Value};

/// Wire format version understood by this build.
pub const PAYLOAD_VERSION: u64 = 1;

/// Errors from building or parsing a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("Invalid base64url in field {field}")]
    InvalidEncoding { field: &'static str },

    #[error("Not JSON: {0}")]
    NotJson(String),
}

/// Advertises an ephemeral public key to start an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    epk_b64: String,
    id: Option<String>,
}

/// Carries the responder's ephemeral public key and a sealed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    epk_b64: String,
    nonce_b64: String,
    ciphertext_b64: String,
}

#[derive(Serialize)]
struct BeaconWire<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    epk_b64: &'a str,
    v: u64,
}

#[derive(Serialize)]
struct ResponseWire<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    epk_b64: &'a str,
    nonce_b64: &'a str,
    ciphertext_b64: &'a str,
    v: u64,
}

fn check_b64(value: &str, field: &'static str) -> Result<(), PayloadError> {
    if is_base64url(value) {
        Ok(())
    } else {
        Err(PayloadError::InvalidEncoding { field })
    }
}

/// Build a beacon around a base64url ephemeral public key.
pub fn make_beacon(epk_b64: &str) -> Result<Beacon, PayloadError> {
    check_b64(epk_b64, "epk_b64")?;
    Ok(Beacon {
        epk_b64: epk_b64.to_string(),
        id: None,
    })
}

/// Build a response from base64url key, nonce and ciphertext.
pub fn make_response(
    epk_b64: &str,
    nonce_b64: &str,
    ciphertext_b64: &str,
) -> Result<Response, PayloadError> {
    check_b64(epk_b64, "epk_b64")?;
    check_b64(nonce_b64, "nonce_b64")?;
    check_b64(ciphertext_b64, "ciphertext_b64")?;
    Ok(Response {
        epk_b64: epk_b64.to_string(),
        nonce_b64: nonce_b64.to_string(),
        ciphertext_b64: ciphertext_b64.to_string(),
    })
}

impl Beacon {
    pub fn epk_b64(&self) -> &str {
        &self.epk_b64
    }

    /// Optional display id some older beacons carry. It is read but never
    /// written back to the wire.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Serialize for the rendering surface.
    pub fn to_wire(&self) -> String {
        let wire = BeaconWire {
            kind: "beacon",
            epk_b64: &self.epk_b64,
            v: PAYLOAD_VERSION,
        };
        // Serializing a struct of strings and integers cannot fail.
        serde_json::to_string(&wire).unwrap_or_default()
    }
}

impl Response {
    pub fn epk_b64(&self) -> &str {
        &self.epk_b64
    }

    pub fn nonce_b64(&self) -> &str {
        &self.nonce_b64
    }

    pub fn ciphertext_b64(&self) -> &str {
        &self.ciphertext_b64
    }

    /// Serialize for the rendering surface.
    pub fn to_wire(&self) -> String {
        let wire = ResponseWire {
            kind: "response",
            epk_b64: &self.epk_b64,
            nonce_b64: &self.nonce_b64,
            ciphertext_b64: &self.ciphertext_b64,
            v: PAYLOAD_VERSION,
        };
        serde_json::to_string(&wire).unwrap_or_default()
    }
}

/// Result of parsing decoded QR text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Beacon(Beacon),
    Response(Response),
    /// Well-formed JSON of an unknown shape or version.
    Unrecognized(String),
}

fn str_field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    obj.get(name).and_then(Value::as_str)
}

/// Parse decoded QR text into a typed payload.
///
/// Text that is not JSON, or a recognised shape with malformed base64url,
/// is an error. JSON that matches neither shape, or carries a version other
/// than [`PAYLOAD_VERSION`], is [`Payload::Unrecognized`]. A missing `v` is
/// read as version 1.
pub fn parse_payload(text: &str) -> Result<Payload, PayloadError> {
    let value: Value =
        serde_json::from_str(text.trim()).map_err(|e| PayloadError::NotJson(e.to_string()))?;

    let Value::Object(obj) = value else {
        return Ok(Payload::Unrecognized("not a JSON object".to_string()));
    };

    match obj.get("v") {
        None => {}
        Some(v) if v.as_u64() == Some(PAYLOAD_VERSION) => {}
        Some(v) => return Ok(Payload::Unrecognized(format!("unsupported version {v}"))),
    }

    let kind = obj.get("type");
    let kind_str = kind.and_then(Value::as_str);

    if kind_str == Some("response") {
        let (Some(epk), Some(nonce), Some(ciphertext)) = (
            str_field(&obj, "epk_b64"),
            str_field(&obj, "nonce_b64"),
            str_field(&obj, "ciphertext_b64"),
        ) else {
            return Ok(Payload::Unrecognized("incomplete response".to_string()));
        };
        return make_response(epk, nonce, ciphertext).map(Payload::Response);
    }

    if kind.is_none() || kind_str == Some("beacon") {
        if let Some(epk) = str_field(&obj, "epk_b64") {
            let mut beacon = make_beacon(epk)?;
            beacon.id = str_field(&obj, "id").map(ToString::to_string);
            return Ok(Payload::Beacon(beacon));
        }
        return Ok(Payload::Unrecognized("no key material".to_string()));
    }

    Ok(Payload::Unrecognized(format!(
        "unknown payload type {}",
        kind.map_or_else(String::new, ToString::to_string)
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    const EPK: &str = "q83vEjRWeJq83vEjRWeJq83vEjRWeJq83vEjRWeJq80";

    #[test]
    fn beacon_wire_format() {
        let beacon = make_beacon(EPK).unwrap();
        assert_eq!(
            beacon.to_wire(),
            format!(r#"{{"type":"beacon","epk_b64":"{EPK}","v":1}}"#)
        );
    }

    #[test]
    fn response_wire_format() {
        let response = make_response(EPK, "bm9uY2U", "Y2lwaGVy").unwrap();
        assert_eq!(
            response.to_wire(),
            format!(
                r#"{{"type":"response","epk_b64":"{EPK}","nonce_b64":"bm9uY2U","ciphertext_b64":"Y2lwaGVy","v":1}}"#
            )
        );
    }

    #[test]
    fn make_beacon_rejects_bad_encoding() {
        assert_eq!(
            make_beacon("not base64!"),
            Err(PayloadError::InvalidEncoding { field: "epk_b64" })
        );
        assert_eq!(
            make_beacon(""),
            Err(PayloadError::InvalidEncoding { field: "epk_b64" })
        );
    }

    #[test]
    fn make_response_names_the_bad_field() {
        assert_eq!(
            make_response(EPK, "bm9uY2U=", "Y2lwaGVy"),
            Err(PayloadError::InvalidEncoding { field: "nonce_b64" })
        );
        assert_eq!(
            make_response(EPK, "bm9uY2U", "+/+/"),
            Err(PayloadError::InvalidEncoding {
                field: "ciphertext_b64"
            })
        );
    }

    #[test]
    fn parse_roundtrips_wire_text() {
        let beacon = make_beacon(EPK).unwrap();
        assert_eq!(
            parse_payload(&beacon.to_wire()).unwrap(),
            Payload::Beacon(beacon)
        );

        let response = make_response(EPK, "bm9uY2U", "Y2lwaGVy").unwrap();
        assert_eq!(
            parse_payload(&response.to_wire()).unwrap(),
            Payload::Response(response)
        );
    }

    #[test]
    fn parse_accepts_untyped_beacon_with_id() {
        let text = format!(r#"{{"epk_b64":"{EPK}","id":"k3x9"}}"#);
        let Payload::Beacon(beacon) = parse_payload(&text).unwrap() else {
            panic!("expected beacon");
        };
        assert_eq!(beacon.id(), Some("k3x9"));
        assert_eq!(beacon.epk_b64(), EPK);
    }

    #[test]
    fn legacy_beacon_reserializes_in_current_format() {
        let text = format!(r#"{{"epk_b64":"{EPK}","id":"k3x9"}}"#);
        let Payload::Beacon(beacon) = parse_payload(&text).unwrap() else {
            panic!("expected beacon");
        };
        assert_eq!(
            beacon.to_wire(),
            format!(r#"{{"type":"beacon","epk_b64":"{EPK}","v":1}}"#)
        );
    }

    #[test]
    fn parse_not_json_is_error() {
        assert!(matches!(
            parse_payload("not json"),
            Err(PayloadError::NotJson(_))
        ));
    }

    #[test]
    fn parse_unknown_version_is_unrecognized() {
        let text = format!(r#"{{"type":"beacon","epk_b64":"{EPK}","v":2}}"#);
        assert!(matches!(
            parse_payload(&text).unwrap(),
            Payload::Unrecognized(_)
        ));
        let text = format!(r#"{{"type":"beacon","epk_b64":"{EPK}","v":"1"}}"#);
        assert!(matches!(
            parse_payload(&text).unwrap(),
            Payload::Unrecognized(_)
        ));
    }

    #[test]
    fn parse_other_shapes_are_unrecognized() {
        for text in [
            "[1,2,3]",
            "42",
            r#"{"hello":"world"}"#,
            r#"{"type":"ping","epk_b64":"AAAA"}"#,
            r#"{"type":"response","epk_b64":"AAAA"}"#,
            r#"{"epkA":"deadbeef"}"#,
        ] {
            assert!(
                matches!(parse_payload(text).unwrap(), Payload::Unrecognized(_)),
                "{text} should be unrecognized"
            );
        }
    }

    #[test]
    fn parse_bad_base64_in_known_shape_is_error() {
        let text = r#"{"type":"response","epk_b64":"AAAA","nonce_b64":"@@","ciphertext_b64":"AAAA","v":1}"#;
        assert_eq!(
            parse_payload(text),
            Err(PayloadError::InvalidEncoding { field: "nonce_b64" })
        );
    }
}
