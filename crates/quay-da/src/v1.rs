//! First-generation generated-key store.
//!
//! Put submits the enveloped payload and polls its status until the batch is
//! confirmed, retrying the whole submit-and-poll cycle on failure. Get
//! fetches the blob by batch position and checks both the commitment and
//! the on-chain confirmation depth before handing the payload back.

use std::sync::Arc;

use bytes::Bytes;
use quay_types::{BackendType, CertV1, CertVersion, Certificate};
use tracing::{debug, info};

use crate::client::{BlobStatus, ChainVerifierV1, DisperserClientV1, RequestId};
use crate::config::V1Config;
use crate::envelope;
use crate::error::{DaError, DisperseError};
use crate::retry::disperse_with_retry;
use crate::store::{GeneratedKeyStore, check_size};

/// Generated-key store for the first DA protocol generation.
pub struct V1Store {
    disperser: Arc<dyn DisperserClientV1>,
    verifier: Arc<dyn ChainVerifierV1>,
    config: V1Config,
}

impl V1Store {
    /// Create a store driving the given collaborators.
    pub fn new(
        disperser: Arc<dyn DisperserClientV1>,
        verifier: Arc<dyn ChainVerifierV1>,
        config: V1Config,
    ) -> Self {
        Self {
            disperser,
            verifier,
            config,
        }
    }

    /// One submit-and-poll cycle.
    async fn disperse_once(&self, blob: Bytes, attempt: u32) -> Result<CertV1, DisperseError> {
        let request = self.disperser.disperse_blob(blob).await?;
        debug!(attempt, request = ?request, "v1 blob submitted, polling status");

        let timeout = self.config.status_query_timeout;
        tokio::time::timeout(timeout, self.await_confirmation(&request))
            .await
            .map_err(|_| DisperseError::ConfirmationTimeout(timeout))?
    }

    /// Poll until the blob is confirmed or the disperser reports failure.
    async fn await_confirmation(&self, request: &RequestId) -> Result<CertV1, DisperseError> {
        loop {
            match self.disperser.blob_status(request).await? {
                BlobStatus::Processing => {
                    tokio::time::sleep(self.config.status_poll_interval).await;
                }
                BlobStatus::Confirmed(cert) | BlobStatus::Finalized(cert) => return Ok(cert),
                BlobStatus::Failed(reason) => return Err(DisperseError::Failed(reason)),
            }
        }
    }
}

#[async_trait::async_trait]
impl GeneratedKeyStore for V1Store {
    async fn put(&self, payload: &[u8]) -> Result<Bytes, DaError> {
        check_size(payload, self.config.max_blob_size)?;
        let blob = envelope::encode(payload);

        let cert = disperse_with_retry(&self.config.retry_policy(), |attempt| {
            let blob = blob.clone();
            async move { self.disperse_once(blob, attempt).await }
        })
        .await?;

        info!(
            size = payload.len(),
            blob_index = cert.blob_index,
            block = cert.reference_block_number,
            "v1 blob dispersed"
        );
        Ok(Bytes::from(cert.encode()?))
    }

    async fn get(&self, cert: &[u8]) -> Result<Bytes, DaError> {
        let cert = CertV1::decode(cert)?;
        let blob = self
            .disperser
            .retrieve_blob(&cert.batch_header_hash, cert.blob_index)
            .await
            .map_err(DaError::Retrieval)?;

        self.verifier
            .verify_commitment_v1(&cert, &blob)
            .map_err(DaError::Verification)?;
        self.verifier
            .verify_cert_v1(&cert, self.config.confirmation_depth)
            .await
            .map_err(DaError::Verification)?;

        Ok(envelope::decode(&blob)?)
    }

    async fn verify(&self, cert: &[u8], payload: Option<&[u8]>) -> Result<(), DaError> {
        let cert = CertV1::decode(cert)?;
        self.verifier
            .verify_cert_v1(&cert, self.config.confirmation_depth)
            .await
            .map_err(DaError::Verification)?;
        if let Some(payload) = payload {
            self.verifier
                .verify_commitment_v1(&cert, &envelope::encode(payload))
                .map_err(DaError::Verification)?;
        }
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::DaV1
    }

    fn cert_version(&self) -> CertVersion {
        CertVersion::V1
    }
}
