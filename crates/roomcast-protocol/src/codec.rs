//! Codec for encoding and decoding RoomCast envelopes.
//!
//! Envelopes travel as one JSON document per transport message, so no
//! additional framing is applied here.

use bytes::Bytes;
use thiserror::Error;

use crate::envelope::Envelope;

/// Maximum accepted envelope size (1 MiB).
pub const MAX_ENVELOPE_SIZE: usize = 1024 * 1024;

/// Errors that can occur while decoding an envelope.
///
/// Decode errors are never fatal to a connection; the offending message
/// is discarded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input exceeds the maximum envelope size.
    #[error("Envelope size {0} exceeds maximum {MAX_ENVELOPE_SIZE}")]
    TooLarge(usize),

    /// Malformed JSON or missing required fields.
    #[error("Malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error produced when an envelope cannot be serialized.
#[derive(Debug, Error)]
#[error("Encoding error: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Encode an envelope to bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(envelope: &Envelope) -> Result<Bytes, EncodeError> {
    let buf = serde_json::to_vec(envelope)?;
    Ok(Bytes::from(buf))
}

/// Decode an envelope from bytes.
///
/// # Errors
///
/// Returns an error if the data is too large, not valid JSON, or lacks a
/// `type` field.
pub fn decode(data: &[u8]) -> Result<Envelope, DecodeError> {
    if data.len() > MAX_ENVELOPE_SIZE {
        return Err(DecodeError::TooLarge(data.len()));
    }

    let envelope = serde_json::from_slice(data)?;
    Ok(envelope)
}
