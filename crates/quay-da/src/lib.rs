//! Generated-key stores for quay.
//!
//! This crate provides:
//!
//! - [`GeneratedKeyStore`]: Put returns a certificate; Get and Verify take one.
//! - [`V1Store`] / [`V2Store`]: the two DA protocol generations.
//! - [`retry`]: dispersal error classification and the retry loop.
//! - [`client`]: interfaces of the external DA network collaborators.
//! - [`MemDa`]: an in-process simulated network implementing all of them.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod memstore;
pub mod retry;
pub mod store;
pub mod v1;
pub mod v2;

pub use client::{
    BlobStatus, CertVerifier, CertificationStatus, ChainVerifierV1, ClientError,
    DisperserClientV1, PayloadDisperser, PayloadRetriever, RequestId,
};
pub use config::{DEFAULT_MAX_BLOB_SIZE, V1Config, V2Config};
pub use envelope::{EnvelopeError, MAX_PAYLOAD_LEN};
pub use error::{DaError, DisperseError, StatusCode};
pub use memstore::{MemDa, MemDaConfig};
pub use retry::{RetryDecision, RetryPolicy};
pub use store::GeneratedKeyStore;
pub use v1::V1Store;
pub use v2::V2Store;
