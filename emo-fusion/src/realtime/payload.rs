//! Base64 payload decoding for real-time media frames

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("empty payload")]
    Empty,

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}

/// Decode a base64 string, dropping a data-URI prefix if present
///
/// Everything up to and including the first comma is treated as the prefix
/// (`data:image/jpeg;base64,...`).
pub fn decode_base64_payload(data: &str) -> Result<Vec<u8>, PayloadError> {
    let encoded = match data.split_once(',') {
        Some((_, rest)) => rest,
        None => data,
    };
    let encoded = encoded.trim();

    if encoded.is_empty() {
        return Err(PayloadError::Empty);
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| PayloadError::InvalidBase64(e.to_string()))?;

    if bytes.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(bytes)
}
