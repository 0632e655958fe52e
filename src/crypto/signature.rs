//! Signature codec
//!
//! Signatures travel as a single hex blob of exactly three fields:
//!
//! ```text
//! [ R: 32 bytes ][ S: 32 bytes ][ V: 1 byte ]
//! ```
//!
//! Verification happens elsewhere; this module only packs and slices.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the R component
pub const R_LEN: usize = 32;

/// Length of the S component
pub const S_LEN: usize = 32;

/// Total encoded length (R + S + V)
pub const SIGNATURE_LEN: usize = R_LEN + S_LEN + 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature: {0}")]
    Malformed(String),
}

/// The three logical fields of a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureParts {
    pub r: [u8; R_LEN],
    pub s: [u8; S_LEN],
    pub v: u8,
}

/// Signature as carried on the wire: `{"value": "0x..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    value: String,
}

impl Signature {
    pub fn from_parts(r: &[u8; R_LEN], s: &[u8; S_LEN], v: u8) -> Self {
        Self {
            value: encode(r, s, v),
        }
    }

    /// Wrap an already-encoded value. Nothing is validated until [`Signature::parts`].
    pub fn from_encoded(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// All-zero signature, used for tasks that carry no enclave signature
    pub fn empty() -> Self {
        Self::from_parts(&[0u8; R_LEN], &[0u8; S_LEN], 0)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn parts(&self) -> Result<SignatureParts, SignatureError> {
        decode(&self.value)
    }
}

/// Concatenate `r ‖ s ‖ v` and render as `0x`-prefixed lowercase hex.
pub fn encode(r: &[u8; R_LEN], s: &[u8; S_LEN], v: u8) -> String {
    let mut bytes = Vec::with_capacity(SIGNATURE_LEN);
    bytes.extend_from_slice(r);
    bytes.extend_from_slice(s);
    bytes.push(v);
    format!("0x{}", hex::encode(bytes))
}

/// Slice an encoded signature at `[0,32)`, `[32,64)` and byte 64.
///
/// The `0x` prefix is optional. Anything that does not decode to at least
/// [`SIGNATURE_LEN`] bytes is rejected as a whole.
pub fn decode(encoded: &str) -> Result<SignatureParts, SignatureError> {
    let stripped = encoded
        .strip_prefix("0x")
        .or_else(|| encoded.strip_prefix("0X"))
        .unwrap_or(encoded);

    let bytes = hex::decode(stripped)
        .map_err(|e| SignatureError::Malformed(format!("invalid hex: {}", e)))?;

    if bytes.len() < SIGNATURE_LEN {
        return Err(SignatureError::Malformed(format!(
            "expected at least {} bytes, got {}",
            SIGNATURE_LEN,
            bytes.len()
        )));
    }

    let mut r = [0u8; R_LEN];
    let mut s = [0u8; S_LEN];
    r.copy_from_slice(&bytes[..R_LEN]);
    s.copy_from_slice(&bytes[R_LEN..R_LEN + S_LEN]);

    Ok(SignatureParts {
        r,
        s,
        v: bytes[R_LEN + S_LEN],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        for (r, s, v) in [
            (filled(0x00), filled(0x00), 0u8),
            (filled(0xab), filled(0xcd), 27),
            (filled(0xff), filled(0x01), 28),
        ] {
            let parts = decode(&encode(&r, &s, v)).unwrap();
            assert_eq!(parts.r, r);
            assert_eq!(parts.s, s);
            assert_eq!(parts.v, v);
        }
    }

    #[test]
    fn test_encode_layout() {
        let mut r = [0u8; 32];
        r[0] = 0x11;
        let mut s = [0u8; 32];
        s[31] = 0x22;

        let encoded = encode(&r, &s, 0x1b);

        assert!(encoded.starts_with("0x11"));
        assert_eq!(encoded.len(), 2 + SIGNATURE_LEN * 2);
        assert!(encoded.ends_with("221b"));
    }

    #[test]
    fn test_decode_without_prefix() {
        let encoded = encode(&filled(1), &filled(2), 3);
        let parts = decode(encoded.trim_start_matches("0x")).unwrap();
        assert_eq!(parts.v, 3);
    }

    #[test]
    fn test_decode_short_input_is_malformed() {
        let encoded = encode(&filled(7), &filled(8), 9);
        // drop the V byte
        let truncated = &encoded[..encoded.len() - 2];

        let err = decode(truncated).unwrap_err();
        assert!(matches!(err, SignatureError::Malformed(_)));
        assert!(decode("0x").is_err());
        assert!(decode("").is_err());
    }

    #[test]
    fn test_decode_invalid_hex_is_malformed() {
        let bad = format!("0x{}", "zz".repeat(SIGNATURE_LEN));
        assert!(matches!(decode(&bad), Err(SignatureError::Malformed(_))));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut encoded = encode(&filled(4), &filled(5), 6);
        encoded.push_str("ffff");

        let parts = decode(&encoded).unwrap();
        assert_eq!(parts.r, filled(4));
        assert_eq!(parts.s, filled(5));
        assert_eq!(parts.v, 6);
    }

    #[test]
    fn test_signature_wire_format() {
        let signature = Signature::from_parts(&filled(1), &filled(2), 27);
        let json = serde_json::to_value(&signature).unwrap();
        assert_eq!(json["value"], signature.value());

        let back: Signature = serde_json::from_value(json).unwrap();
        assert_eq!(back.parts().unwrap().v, 27);
    }

    #[test]
    fn test_empty_signature_is_well_formed() {
        let parts = Signature::empty().parts().unwrap();
        assert_eq!(parts.r, [0u8; 32]);
        assert_eq!(parts.v, 0);
    }
}
