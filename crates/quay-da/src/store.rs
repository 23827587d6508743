//! The generated-key store trait.

use bytes::Bytes;
use quay_types::{BackendType, CertVersion};

use crate::envelope;
use crate::error::DaError;

/// A backend that issues its own keys: Put returns a certificate, and the
/// certificate is all that is needed to Get or Verify later.
///
/// Implementations hold no per-request state; everything needed to read a
/// blob back lives in the certificate.
#[async_trait::async_trait]
pub trait GeneratedKeyStore: Send + Sync {
    /// Disperse a payload and return the encoded certificate.
    async fn put(&self, payload: &[u8]) -> Result<Bytes, DaError>;

    /// Retrieve and verify the payload behind a certificate.
    async fn get(&self, cert: &[u8]) -> Result<Bytes, DaError>;

    /// Verify a certificate and, when given, that `payload` matches it.
    async fn verify(&self, cert: &[u8], payload: Option<&[u8]>) -> Result<(), DaError>;

    /// Backend tag of this store.
    fn backend_type(&self) -> BackendType;

    /// Certificate version this store issues and reads.
    fn cert_version(&self) -> CertVersion;
}

/// Reject payloads larger than `max` or than an envelope can frame.
pub(crate) fn check_size(payload: &[u8], max: usize) -> Result<(), DaError> {
    let max = max.min(envelope::MAX_PAYLOAD_LEN);
    if payload.len() > max {
        return Err(DaError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }
    Ok(())
}
