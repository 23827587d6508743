//! Payload envelope wrapped around client payloads before dispersal.
//!
//! ```text
//! [encoding_version: u8][payload_len: u32 BE][payload]
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Current envelope encoding version.
pub const ENCODING_VERSION: u8 = 0;

/// Size of the envelope header in bytes.
pub const HEADER_LEN: usize = 5;

/// Largest payload the length header can describe.
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// Errors unwrapping a payload envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Shorter than the header.
    #[error("envelope truncated: {0} bytes")]
    Truncated(usize),

    /// Header names an encoding this proxy cannot read.
    #[error("unknown envelope encoding version {0}")]
    UnknownVersion(u8),

    /// Declared payload length disagrees with the bytes present.
    #[error("envelope declares {declared} payload bytes but carries {actual}")]
    LengthMismatch {
        /// Length in the header.
        declared: usize,
        /// Bytes after the header.
        actual: usize,
    },
}

/// Wrap a payload in an envelope.
///
/// Callers bound `payload` by [`MAX_PAYLOAD_LEN`] first.
pub fn encode(payload: &[u8]) -> Bytes {
    debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(ENCODING_VERSION);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Unwrap a payload from an envelope without copying.
pub fn decode(blob: &Bytes) -> Result<Bytes, EnvelopeError> {
    if blob.len() < HEADER_LEN {
        return Err(EnvelopeError::Truncated(blob.len()));
    }
    if blob[0] != ENCODING_VERSION {
        return Err(EnvelopeError::UnknownVersion(blob[0]));
    }
    let declared = u32::from_be_bytes([blob[1], blob[2], blob[3], blob[4]]) as usize;
    let actual = blob.len() - HEADER_LEN;
    if declared != actual {
        return Err(EnvelopeError::LengthMismatch { declared, actual });
    }
    Ok(blob.slice(HEADER_LEN..))
}
