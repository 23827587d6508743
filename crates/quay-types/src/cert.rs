//! Versioned certificate wire format.
//!
//! A certificate is the only key a client ever holds. On the wire it is a
//! single version tag byte followed by the postcard encoding of the
//! protocol-specific body:
//!
//! ```text
//! [tag: u8][postcard(CertV1 | CertV2)]
//! ```
//!
//! The tag makes every certificate self-describing, so the issuing protocol
//! generation can be recovered from the bytes alone. Decoding is strict:
//! unknown tags, truncated bodies and trailing bytes are all rejected with a
//! [`CertError`], which is distinct from any verification failure.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Commitment;

/// Protocol generation that issued a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CertVersion {
    /// First-generation DA protocol.
    V1,
    /// Second-generation DA protocol.
    V2,
}

impl CertVersion {
    /// Leading wire tag for this version.
    pub const fn tag(self) -> u8 {
        match self {
            Self::V1 => 0x00,
            Self::V2 => 0x01,
        }
    }

    /// Resolve a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self, CertError> {
        match tag {
            0x00 => Ok(Self::V1),
            0x01 => Ok(Self::V2),
            other => Err(CertError::UnknownVersion(other)),
        }
    }

    /// Peek at the version of an encoded certificate without decoding it.
    pub fn of(cert: &[u8]) -> Result<Self, CertError> {
        let tag = *cert.first().ok_or(CertError::Empty)?;
        Self::from_tag(tag)
    }
}

impl fmt::Display for CertVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("v1"),
            Self::V2 => f.write_str("v2"),
        }
    }
}

/// Errors decoding or encoding a certificate.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    /// Zero-length input.
    #[error("empty certificate")]
    Empty,

    /// The leading tag does not name a known protocol generation.
    #[error("unknown certificate version tag 0x{0:02x}")]
    UnknownVersion(u8),

    /// The tag names a different generation than the decoder expects.
    #[error("certificate version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version the decoder handles.
        expected: CertVersion,
        /// Version named by the tag.
        found: CertVersion,
    },

    /// The body is not a valid encoding.
    #[error("malformed certificate body: {0}")]
    Malformed(#[from] postcard::Error),

    /// Extra bytes after a complete body.
    #[error("certificate has {0} trailing byte(s)")]
    TrailingBytes(usize),
}

/// A protocol certificate with a versioned binary encoding.
pub trait Certificate: Serialize + DeserializeOwned + Sized {
    /// Generation tag written ahead of the body.
    const VERSION: CertVersion;

    /// Commitment to the dispersed blob.
    fn commitment(&self) -> &Commitment;

    /// Encode as `[tag][body]`.
    fn encode(&self) -> Result<Vec<u8>, CertError> {
        let body = postcard::to_allocvec(self)?;
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(Self::VERSION.tag());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode from `[tag][body]`, rejecting other versions and trailing bytes.
    fn decode(bytes: &[u8]) -> Result<Self, CertError> {
        let found = CertVersion::of(bytes)?;
        if found != Self::VERSION {
            return Err(CertError::VersionMismatch {
                expected: Self::VERSION,
                found,
            });
        }
        let (cert, rest) = postcard::take_from_bytes::<Self>(&bytes[1..])?;
        if !rest.is_empty() {
            return Err(CertError::TrailingBytes(rest.len()));
        }
        Ok(cert)
    }
}

/// First-generation certificate: a blob's position inside a confirmed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertV1 {
    /// Hash of the batch header the blob was confirmed in.
    pub batch_header_hash: [u8; 32],
    /// Index of the blob inside the batch.
    pub blob_index: u32,
    /// Chain block at which the batch was confirmed.
    pub reference_block_number: u64,
    /// Quorums that attested to the blob.
    pub quorum_numbers: Vec<u8>,
    /// Commitment to the dispersed blob.
    pub commitment: Commitment,
    /// Length of the dispersed blob in bytes.
    pub data_length: u32,
    /// Aggregated attestation over every field above.
    pub attestation: [u8; 32],
}

impl Certificate for CertV1 {
    const VERSION: CertVersion = CertVersion::V1;

    fn commitment(&self) -> &Commitment {
        &self.commitment
    }
}

/// Second-generation certificate, checked against a cert-verifier contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertV2 {
    /// Protocol-side identifier of the blob.
    pub blob_key: [u8; 32],
    /// Blob parameters version used at dispersal.
    pub blob_version: u16,
    /// Commitment to the dispersed blob.
    pub commitment: Commitment,
    /// Length of the dispersed blob in bytes.
    pub blob_length: u32,
    /// Chain block the verifier contract checks the attestation against.
    pub reference_block_number: u64,
    /// Quorums that signed the blob.
    pub quorum_numbers: Vec<u8>,
    /// Aggregated attestation over every field above.
    pub attestation: [u8; 32],
}

impl Certificate for CertV2 {
    const VERSION: CertVersion = CertVersion::V2;

    fn commitment(&self) -> &Commitment {
        &self.commitment
    }
}
