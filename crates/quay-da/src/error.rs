//! Error types for the generated-key stores.

use std::fmt;
use std::time::Duration;

use quay_types::CertError;

use crate::client::ClientError;
use crate::envelope::EnvelopeError;

/// Status code carried by a protocol-level rejection from the disperser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The request is malformed or oversized; it will fail the same way again.
    InvalidArgument,
    /// The disperser is rate limiting this client.
    ResourceExhausted,
    /// The disperser is temporarily down.
    Unavailable,
    /// The disperser did not answer in time.
    DeadlineExceeded,
    /// Internal disperser failure.
    Internal,
    /// The referenced request does not exist.
    NotFound,
    /// The disperser is not in a state to accept the request.
    FailedPrecondition,
    /// Any code this proxy does not know about.
    Unknown,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidArgument => "invalid argument",
            Self::ResourceExhausted => "resource exhausted",
            Self::Unavailable => "unavailable",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::Internal => "internal",
            Self::NotFound => "not found",
            Self::FailedPrecondition => "failed precondition",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A single failed dispersal attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DisperseError {
    /// Connection-level failure before the disperser produced a status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The disperser rejected the request with a protocol status.
    #[error("disperser returned {code}: {message}")]
    Status {
        /// Protocol status code.
        code: StatusCode,
        /// Human-readable detail from the disperser.
        message: String,
    },

    /// The disperser accepted the blob but later reported it as failed.
    #[error("dispersal failed: {0}")]
    Failed(String),

    /// The blob was not confirmed before the configured timeout.
    #[error("blob not confirmed within {0:?}")]
    ConfirmationTimeout(Duration),
}

impl DisperseError {
    /// Shorthand for a protocol status rejection.
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// The protocol status code, if this is a status rejection.
    pub fn code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors returned by a [`GeneratedKeyStore`](crate::GeneratedKeyStore).
#[derive(Debug, thiserror::Error)]
pub enum DaError {
    /// The input is not a certificate this store can decode.
    #[error("certificate decode failed: {0}")]
    Decode(#[from] CertError),

    /// The payload exceeds the configured maximum blob size.
    #[error("payload of {size} bytes exceeds maximum blob size of {max} bytes")]
    PayloadTooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Configured maximum in bytes.
        max: usize,
    },

    /// Dispersal failed terminally; carries only the final attempt's error.
    #[error("dispersal failed after {attempts} attempt(s): {source}")]
    Dispersal {
        /// Attempts made before giving up.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        source: DisperseError,
    },

    /// The blob could not be fetched from the DA network.
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] ClientError),

    /// The certificate or the blob failed verification.
    #[error("verification failed: {0}")]
    Verification(#[source] ClientError),

    /// A verified blob did not contain a well-formed payload envelope.
    #[error("malformed payload envelope: {0}")]
    Envelope(#[from] EnvelopeError),
}

impl DaError {
    /// Whether the input bytes were not a decodable certificate.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Whether the caller sent something that can never succeed as is.
    pub fn is_caller_error(&self) -> bool {
        match self {
            Self::PayloadTooLarge { .. } => true,
            Self::Dispersal { source, .. } => source.code() == Some(StatusCode::InvalidArgument),
            _ => false,
        }
    }

    /// Whether a certificate or blob failed verification.
    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}
