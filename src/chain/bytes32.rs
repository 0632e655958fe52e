//! Fixed-width `bytes32` <-> string conversion.

use super::ChainModelError;

pub const BYTES32_LEN: usize = 32;

/// Decode a hex `bytes32` into text, dropping the right-hand NUL padding.
pub fn bytes32_to_string(raw: &str) -> Result<String, ChainModelError> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(stripped)
        .map_err(|e| ChainModelError::InvalidBytes32(format!("{}: {}", raw, e)))?;

    if bytes.len() > BYTES32_LEN {
        return Err(ChainModelError::InvalidBytes32(format!(
            "{}: {} bytes exceeds {}",
            raw,
            bytes.len(),
            BYTES32_LEN
        )));
    }

    let end = bytes
        .iter()
        .rposition(|b| *b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);

    String::from_utf8(bytes[..end].to_vec())
        .map_err(|e| ChainModelError::InvalidBytes32(format!("{}: {}", raw, e)))
}

/// Encode text as a right-padded `bytes32` hex value.
pub fn string_to_bytes32(value: &str) -> Result<String, ChainModelError> {
    let bytes = value.as_bytes();
    if bytes.len() > BYTES32_LEN {
        return Err(ChainModelError::InvalidBytes32(format!(
            "{:?} is longer than {} bytes",
            value, BYTES32_LEN
        )));
    }

    let mut padded = [0u8; BYTES32_LEN];
    padded[..bytes.len()].copy_from_slice(bytes);
    Ok(format!("0x{}", hex::encode(padded)))
}
