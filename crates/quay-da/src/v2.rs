//! Second-generation generated-key store.
//!
//! Put submits the enveloped payload and polls for certification. Failed
//! attempts are classified by [`retry::classify`](crate::retry::classify):
//! invalid-argument rejections are final, rate limiting backs off, and
//! everything else is retried up to the configured budget. Get relies on
//! the retriever's on-path commitment check; Verify asks the cert-verifier
//! contract.

use std::sync::Arc;

use bytes::Bytes;
use quay_types::{BackendType, CertV2, CertVersion, Certificate};
use tracing::{debug, info};

use crate::client::{
    CertVerifier, CertificationStatus, ClientError, PayloadDisperser, PayloadRetriever,
    RequestId,
};
use crate::config::V2Config;
use crate::envelope;
use crate::error::{DaError, DisperseError, StatusCode};
use crate::retry::disperse_with_retry;
use crate::store::{GeneratedKeyStore, check_size};

/// Generated-key store for the second DA protocol generation.
pub struct V2Store {
    disperser: Arc<dyn PayloadDisperser>,
    retriever: Arc<dyn PayloadRetriever>,
    verifier: Arc<dyn CertVerifier>,
    config: V2Config,
}

impl V2Store {
    /// Create a store driving the given collaborators.
    pub fn new(
        disperser: Arc<dyn PayloadDisperser>,
        retriever: Arc<dyn PayloadRetriever>,
        verifier: Arc<dyn CertVerifier>,
        config: V2Config,
    ) -> Self {
        Self {
            disperser,
            retriever,
            verifier,
            config,
        }
    }

    /// Submit once and wait for certification.
    async fn disperse_once(&self, blob: Bytes, attempt: u32) -> Result<CertV2, DisperseError> {
        let submit_timeout = self.config.disperse_blob_timeout;
        let request = tokio::time::timeout(
            submit_timeout,
            self.disperser.submit_blob(blob, self.config.blob_version),
        )
        .await
        .map_err(|_| {
            DisperseError::status(
                StatusCode::DeadlineExceeded,
                format!("submit did not complete within {submit_timeout:?}"),
            )
        })??;
        debug!(attempt, request = ?request, "v2 blob submitted, awaiting certification");

        let certified_timeout = self.config.blob_certified_timeout;
        tokio::time::timeout(certified_timeout, self.await_certification(&request))
            .await
            .map_err(|_| DisperseError::ConfirmationTimeout(certified_timeout))?
    }

    /// Poll until the blob is certified or the disperser reports failure.
    async fn await_certification(&self, request: &RequestId) -> Result<CertV2, DisperseError> {
        loop {
            match self.disperser.certification_status(request).await? {
                CertificationStatus::Queued | CertificationStatus::Encoded => {
                    tokio::time::sleep(self.config.blob_status_poll_interval).await;
                }
                CertificationStatus::Certified(cert) => return Ok(cert),
                CertificationStatus::Failed(reason) => return Err(DisperseError::Failed(reason)),
            }
        }
    }
}

#[async_trait::async_trait]
impl GeneratedKeyStore for V2Store {
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
            block = cert.reference_block_number,
            "v2 blob certified"
        );
        Ok(Bytes::from(cert.encode()?))
    }

    async fn get(&self, cert: &[u8]) -> Result<Bytes, DaError> {
        let cert = CertV2::decode(cert)?;
        let blob = self.retriever.get_payload(&cert).await.map_err(|e| match e {
            ClientError::CommitmentMismatch | ClientError::InvalidCert(_) => {
                DaError::Verification(e)
            }
            other => DaError::Retrieval(other),
        })?;
        Ok(envelope::decode(&blob)?)
    }

    async fn verify(&self, cert: &[u8], payload: Option<&[u8]>) -> Result<(), DaError> {
        let cert = CertV2::decode(cert)?;
        self.verifier
            .verify_cert_v2(&self.config.cert_verifier_address, &cert)
            .await
            .map_err(DaError::Verification)?;
        if let Some(payload) = payload {
            self.verifier
                .verify_commitment_v2(&cert, &envelope::encode(payload))
                .map_err(DaError::Verification)?;
        }
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::DaV2
    }

    fn cert_version(&self) -> CertVersion {
        CertVersion::V2
    }
}
