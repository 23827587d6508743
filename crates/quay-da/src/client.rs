//! Interfaces of the external DA network collaborators.
//!
//! The stores never talk to the network directly; they drive these traits,
//! which a real network client or the in-process [`MemDa`](crate::MemDa)
//! implements. Every handle is `Send + Sync` and shared behind an `Arc`.

use bytes::Bytes;
use quay_types::{CertV1, CertV2, ContractAddress};

use crate::error::DisperseError;

/// Opaque handle for a submitted blob, issued by the disperser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub Bytes);

/// Dispersal progress of a first-generation blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobStatus {
    /// Still being batched or attested.
    Processing,
    /// Included in a confirmed batch.
    Confirmed(CertV1),
    /// Included in a finalized batch.
    Finalized(CertV1),
    /// The disperser gave up on the blob.
    Failed(String),
}

/// Certification progress of a second-generation blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificationStatus {
    /// Accepted and waiting to be encoded.
    Queued,
    /// Encoded and distributed, waiting for signatures.
    Encoded,
    /// Enough quorum signatures collected.
    Certified(CertV2),
    /// The disperser gave up on the blob.
    Failed(String),
}

/// Errors from retrieval and verification collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Could not reach the network.
    #[error("transport error: {0}")]
    Transport(String),

    /// The network has no blob for this certificate.
    #[error("blob not found")]
    NotFound,

    /// The blob does not match the certificate's commitment.
    #[error("blob does not match certificate commitment")]
    CommitmentMismatch,

    /// The certificate's attestation is invalid.
    #[error("invalid certificate: {0}")]
    InvalidCert(String),

    /// The certificate's batch is not yet deep enough on chain.
    #[error("confirmation depth {actual} below required {required}")]
    InsufficientDepth {
        /// Configured confirmation depth.
        required: u64,
        /// Blocks observed since the reference block.
        actual: u64,
    },
}

/// First-generation disperser client.
#[async_trait::async_trait]
pub trait DisperserClientV1: Send + Sync {
    /// Submit a blob for dispersal.
    async fn disperse_blob(&self, blob: Bytes) -> Result<RequestId, DisperseError>;

    /// Query the dispersal status of a submitted blob.
    async fn blob_status(&self, request: &RequestId) -> Result<BlobStatus, DisperseError>;

    /// Fetch a confirmed blob by its position in a batch.
    async fn retrieve_blob(
        &self,
        batch_header_hash: &[u8; 32],
        blob_index: u32,
    ) -> Result<Bytes, ClientError>;
}

/// First-generation on-chain verifier.
#[async_trait::async_trait]
pub trait ChainVerifierV1: Send + Sync {
    /// Check the attestation and that the batch is at least
    /// `confirmation_depth` blocks deep.
    async fn verify_cert_v1(&self, cert: &CertV1, confirmation_depth: u64)
    -> Result<(), ClientError>;

    /// Check that a blob matches the certificate's commitment.
    fn verify_commitment_v1(&self, cert: &CertV1, blob: &[u8]) -> Result<(), ClientError>;
}

/// Second-generation disperser client.
#[async_trait::async_trait]
pub trait PayloadDisperser: Send + Sync {
    /// Submit a blob for dispersal under the given blob parameters version.
    async fn submit_blob(&self, blob: Bytes, blob_version: u16)
    -> Result<RequestId, DisperseError>;

    /// Query the certification status of a submitted blob.
    async fn certification_status(
        &self,
        request: &RequestId,
    ) -> Result<CertificationStatus, DisperseError>;
}

/// Second-generation retrieval client.
#[async_trait::async_trait]
pub trait PayloadRetriever: Send + Sync {
    /// Fetch the blob for a certificate, verifying it against the
    /// certificate's commitment before returning it.
    async fn get_payload(&self, cert: &CertV2) -> Result<Bytes, ClientError>;
}

/// Second-generation cert-verifier contract.
#[async_trait::async_trait]
pub trait CertVerifier: Send + Sync {
    /// Check a certificate against the verifier contract at `verifier`.
    async fn verify_cert_v2(
        &self,
        verifier: &ContractAddress,
        cert: &CertV2,
    ) -> Result<(), ClientError>;

    /// Check that a blob matches the certificate's commitment.
    fn verify_commitment_v2(&self, cert: &CertV2, blob: &[u8]) -> Result<(), ClientError>;
}
