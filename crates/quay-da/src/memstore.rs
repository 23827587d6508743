//! In-process simulated DA network.
//!
//! [`MemDa`] implements every collaborator trait for both protocol
//! generations, so either store can run without a real network. Blobs are
//! committed to with BLAKE3 and certificates carry a keyed-BLAKE3
//! attestation over all of their fields, so any edit to a certificate makes
//! it fail verification. A simulated chain height advances by one block per
//! confirmed blob.
//!
//! The disperser and relay are one failure domain ([`MemDa::set_online`]);
//! the chain that verifies certificates is another
//! ([`MemDa::set_chain_online`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use bytes::Bytes;
use quay_types::{CertV1, CertV2, Commitment, ContractAddress};
use tracing::debug;

use crate::client::{
    BlobStatus, CertVerifier, CertificationStatus, ChainVerifierV1, ClientError,
    DisperserClientV1, PayloadDisperser, PayloadRetriever, RequestId,
};
use crate::error::{DisperseError, StatusCode};

/// Behaviour of the simulated network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemDaConfig {
    /// Delay applied to every blob submission.
    pub put_latency: Duration,
    /// Delay applied to every blob retrieval.
    pub get_latency: Duration,
    /// Status polls answered as still pending before a blob confirms.
    pub pending_polls: u32,
    /// Address at which the simulated cert-verifier contract is deployed.
    pub cert_verifier_address: ContractAddress,
    /// Quorums recorded in issued certificates.
    pub quorum_numbers: Vec<u8>,
}

impl Default for MemDaConfig {
    fn default() -> Self {
        Self {
            put_latency: Duration::ZERO,
            get_latency: Duration::ZERO,
            pending_polls: 1,
            cert_verifier_address: ContractAddress::default(),
            quorum_numbers: vec![0, 1],
        }
    }
}

struct PendingV1 {
    blob: Bytes,
    polls_left: u32,
    cert: Option<CertV1>,
}

struct PendingV2 {
    blob: Bytes,
    blob_version: u16,
    polls_left: u32,
    cert: Option<CertV2>,
}

/// A simulated DA network serving both protocol generations.
pub struct MemDa {
    config: MemDaConfig,
    key: [u8; 32],
    online: AtomicBool,
    chain_online: AtomicBool,
    block_number: AtomicU64,
    next_request: AtomicU64,
    v1_pending: Mutex<HashMap<RequestId, PendingV1>>,
    v1_blobs: RwLock<HashMap<([u8; 32], u32), Bytes>>,
    v2_pending: Mutex<HashMap<RequestId, PendingV2>>,
    v2_blobs: RwLock<HashMap<[u8; 32], Bytes>>,
}

impl MemDa {
    /// Start a network with a random attestation key.
    pub fn new(config: MemDaConfig) -> Self {
        Self::with_key(config, rand::random())
    }

    /// Start a network with a fixed attestation key.
    pub fn with_key(config: MemDaConfig, key: [u8; 32]) -> Self {
        Self {
            config,
            key,
            online: AtomicBool::new(true),
            chain_online: AtomicBool::new(true),
            block_number: AtomicU64::new(1),
            next_request: AtomicU64::new(0),
            v1_pending: Mutex::new(HashMap::new()),
            v1_blobs: RwLock::new(HashMap::new()),
            v2_pending: Mutex::new(HashMap::new()),
            v2_blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Take the disperser and relay offline (submissions, status polls and
    /// retrievals fail with a transport error) or bring them back.
    /// Certificate verification keeps working.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make the chain unreachable, failing certificate verification with a
    /// transport error, or bring it back.
    pub fn set_chain_online(&self, online: bool) {
        self.chain_online.store(online, Ordering::SeqCst);
    }

    /// Current simulated chain height.
    pub fn current_block(&self) -> u64 {
        self.block_number.load(Ordering::SeqCst)
    }

    /// Mine `n` empty blocks.
    pub fn advance_blocks(&self, n: u64) {
        self.block_number.fetch_add(n, Ordering::SeqCst);
    }

    /// Drop every stored blob while keeping certificates valid, as if the
    /// network had pruned them.
    pub fn forget_blobs(&self) {
        self.v1_blobs.write().expect("lock poisoned").clear();
        self.v2_blobs.write().expect("lock poisoned").clear();
    }

    /// Number of retrievable blobs across both generations.
    pub fn blob_count(&self) -> usize {
        self.v1_blobs.read().expect("lock poisoned").len()
            + self.v2_blobs.read().expect("lock poisoned").len()
    }

    /// Payload bytes still held by requests that have not been sealed.
    pub fn pending_bytes(&self) -> usize {
        let v1: usize = self
            .v1_pending
            .lock()
            .expect("lock poisoned")
            .values()
            .map(|p| p.blob.len())
            .sum();
        let v2: usize = self
            .v2_pending
            .lock()
            .expect("lock poisoned")
            .values()
            .map(|p| p.blob.len())
            .sum();
        v1 + v2
    }

    fn ensure_online_disperse(&self) -> Result<(), DisperseError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DisperseError::Transport("simulated network offline".into()))
        }
    }

    fn ensure_online_client(&self) -> Result<(), ClientError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::Transport("simulated network offline".into()))
        }
    }

    fn ensure_chain_online(&self) -> Result<(), ClientError> {
        if self.chain_online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::Transport("simulated chain unreachable".into()))
        }
    }

    fn next_request_id(&self) -> RequestId {
        let n = self.next_request.fetch_add(1, Ordering::SeqCst);
        RequestId(Bytes::copy_from_slice(&n.to_be_bytes()))
    }

    /// Reference block for a newly confirmed blob; the chain moves one block.
    fn confirm_block(&self) -> u64 {
        self.block_number.fetch_add(1, Ordering::SeqCst)
    }

    async fn delay(latency: Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn attest_v1(&self, cert: &CertV1) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(b"v1");
        hasher.update(&cert.batch_header_hash);
        hasher.update(&cert.blob_index.to_be_bytes());
        hasher.update(&cert.reference_block_number.to_be_bytes());
        hasher.update(&(cert.quorum_numbers.len() as u32).to_be_bytes());
        hasher.update(&cert.quorum_numbers);
        hasher.update(cert.commitment.as_bytes());
        hasher.update(&cert.data_length.to_be_bytes());
        hasher.finalize()
    }

    fn attest_v2(&self, cert: &CertV2) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(b"v2");
        hasher.update(&cert.blob_key);
        hasher.update(&cert.blob_version.to_be_bytes());
        hasher.update(cert.commitment.as_bytes());
        hasher.update(&cert.blob_length.to_be_bytes());
        hasher.update(&cert.reference_block_number.to_be_bytes());
        hasher.update(&(cert.quorum_numbers.len() as u32).to_be_bytes());
        hasher.update(&cert.quorum_numbers);
        hasher.finalize()
    }

    fn check_attestation_v1(&self, cert: &CertV1) -> Result<(), ClientError> {
        // blake3::Hash equality is constant time.
        if self.attest_v1(cert) == blake3::Hash::from(cert.attestation) {
            Ok(())
        } else {
            Err(ClientError::InvalidCert("attestation mismatch".into()))
        }
    }

    fn check_attestation_v2(&self, cert: &CertV2) -> Result<(), ClientError> {
        if self.attest_v2(cert) == blake3::Hash::from(cert.attestation) {
            Ok(())
        } else {
            Err(ClientError::InvalidCert("attestation mismatch".into()))
        }
    }

    fn seal_v1(&self, request: &RequestId, blob: &Bytes) -> CertV1 {
        let reference_block_number = self.confirm_block();
        let mut batch = blake3::Hasher::new_keyed(&self.key);
        batch.update(b"batch");
        batch.update(&request.0);
        batch.update(&reference_block_number.to_be_bytes());

        let mut cert = CertV1 {
            batch_header_hash: *batch.finalize().as_bytes(),
            blob_index: 0,
            reference_block_number,
            quorum_numbers: self.config.quorum_numbers.clone(),
            commitment: Commitment::from_data(blob),
            data_length: blob.len() as u32,
            attestation: [0; 32],
        };
        cert.attestation = *self.attest_v1(&cert).as_bytes();
        cert
    }

    fn seal_v2(&self, request: &RequestId, blob: &Bytes, blob_version: u16) -> CertV2 {
        let mut blob_key = blake3::Hasher::new();
        blob_key.update(&request.0);
        blob_key.update(blob);

        let mut cert = CertV2 {
            blob_key: *blob_key.finalize().as_bytes(),
            blob_version,
            commitment: Commitment::from_data(blob),
            blob_length: blob.len() as u32,
            reference_block_number: self.confirm_block(),
            quorum_numbers: self.config.quorum_numbers.clone(),
            attestation: [0; 32],
        };
        cert.attestation = *self.attest_v2(&cert).as_bytes();
        cert
    }
}

fn commitment_matches(commitment: &Commitment, length: u32, blob: &[u8]) -> bool {
    blob.len() == length as usize && Commitment::from_data(blob) == *commitment
}

#[async_trait::async_trait]
impl DisperserClientV1 for MemDa {
    async fn disperse_blob(&self, blob: Bytes) -> Result<RequestId, DisperseError> {
        self.ensure_online_disperse()?;
        Self::delay(self.config.put_latency).await;

        let request = self.next_request_id();
        debug!(request = ?request, size = blob.len(), "memstore: v1 blob accepted");
        self.v1_pending.lock().expect("lock poisoned").insert(
            request.clone(),
            PendingV1 {
                blob,
                polls_left: self.config.pending_polls,
                cert: None,
            },
        );
        Ok(request)
    }

    async fn blob_status(&self, request: &RequestId) -> Result<BlobStatus, DisperseError> {
        self.ensure_online_disperse()?;

        let mut pending = self.v1_pending.lock().expect("lock poisoned");
        let entry = pending
            .get_mut(request)
            .ok_or_else(|| DisperseError::status(StatusCode::NotFound, "unknown request"))?;

        if let Some(cert) = &entry.cert {
            return Ok(BlobStatus::Finalized(cert.clone()));
        }
        if entry.polls_left > 0 {
            entry.polls_left -= 1;
            return Ok(BlobStatus::Processing);
        }

        // Only the certificate stays pending once the blob is retrievable.
        let blob = std::mem::take(&mut entry.blob);
        let cert = self.seal_v1(request, &blob);
        self.v1_blobs
            .write()
            .expect("lock poisoned")
            .insert((cert.batch_header_hash, cert.blob_index), blob);
        entry.cert = Some(cert.clone());
        debug!(block = cert.reference_block_number, "memstore: v1 blob confirmed");
        Ok(BlobStatus::Confirmed(cert))
    }

    async fn retrieve_blob(
        &self,
        batch_header_hash: &[u8; 32],
        blob_index: u32,
    ) -> Result<Bytes, ClientError> {
        self.ensure_online_client()?;
        Self::delay(self.config.get_latency).await;

        self.v1_blobs
            .read()
            .expect("lock poisoned")
            .get(&(*batch_header_hash, blob_index))
            .cloned()
            .ok_or(ClientError::NotFound)
    }
}

#[async_trait::async_trait]
impl ChainVerifierV1 for MemDa {
    async fn verify_cert_v1(
        &self,
        cert: &CertV1,
        confirmation_depth: u64,
    ) -> Result<(), ClientError> {
        self.ensure_chain_online()?;
        self.check_attestation_v1(cert)?;

        let depth = self
            .current_block()
            .saturating_sub(cert.reference_block_number);
        if depth < confirmation_depth {
            return Err(ClientError::InsufficientDepth {
                required: confirmation_depth,
                actual: depth,
            });
        }
        Ok(())
    }

    fn verify_commitment_v1(&self, cert: &CertV1, blob: &[u8]) -> Result<(), ClientError> {
        if commitment_matches(&cert.commitment, cert.data_length, blob) {
            Ok(())
        } else {
            Err(ClientError::CommitmentMismatch)
        }
    }
}

#[async_trait::async_trait]
impl PayloadDisperser for MemDa {
    async fn submit_blob(&self, blob: Bytes, blob_version: u16) -> Result<RequestId, DisperseError> {
        self.ensure_online_disperse()?;
        Self::delay(self.config.put_latency).await;

        let request = self.next_request_id();
        debug!(request = ?request, size = blob.len(), blob_version, "memstore: v2 blob accepted");
        self.v2_pending.lock().expect("lock poisoned").insert(
            request.clone(),
            PendingV2 {
                blob,
                blob_version,
                polls_left: self.config.pending_polls,
                cert: None,
            },
        );
        Ok(request)
    }

    async fn certification_status(
        &self,
        request: &RequestId,
    ) -> Result<CertificationStatus, DisperseError> {
        self.ensure_online_disperse()?;

        let mut pending = self.v2_pending.lock().expect("lock poisoned");
        let entry = pending
            .get_mut(request)
            .ok_or_else(|| DisperseError::status(StatusCode::NotFound, "unknown request"))?;

        if let Some(cert) = &entry.cert {
            return Ok(CertificationStatus::Certified(cert.clone()));
        }
        if entry.polls_left > 0 {
            entry.polls_left -= 1;
            return Ok(if entry.polls_left == 0 {
                CertificationStatus::Encoded
            } else {
                CertificationStatus::Queued
            });
        }

        let blob = std::mem::take(&mut entry.blob);
        let cert = self.seal_v2(request, &blob, entry.blob_version);
        self.v2_blobs
            .write()
            .expect("lock poisoned")
            .insert(cert.blob_key, blob);
        entry.cert = Some(cert.clone());
        debug!(block = cert.reference_block_number, "memstore: v2 blob certified");
        Ok(CertificationStatus::Certified(cert))
    }
}

#[async_trait::async_trait]
impl PayloadRetriever for MemDa {
    async fn get_payload(&self, cert: &CertV2) -> Result<Bytes, ClientError> {
        self.ensure_online_client()?;
        Self::delay(self.config.get_latency).await;
        self.check_attestation_v2(cert)?;

        let blob = self
            .v2_blobs
            .read()
            .expect("lock poisoned")
            .get(&cert.blob_key)
            .cloned()
            .ok_or(ClientError::NotFound)?;
        self.verify_commitment_v2(cert, &blob)?;
        Ok(blob)
    }
}

#[async_trait::async_trait]
impl CertVerifier for MemDa {
    async fn verify_cert_v2(
        &self,
        verifier: &ContractAddress,
        cert: &CertV2,
    ) -> Result<(), ClientError> {
        self.ensure_chain_online()?;
        if *verifier != self.config.cert_verifier_address {
            return Err(ClientError::InvalidCert(format!(
                "no cert verifier deployed at {verifier}"
            )));
        }
        self.check_attestation_v2(cert)
    }

    fn verify_commitment_v2(&self, cert: &CertV2, blob: &[u8]) -> Result<(), ClientError> {
        if commitment_matches(&cert.commitment, cert.blob_length, blob) {
            Ok(())
        } else {
            Err(ClientError::CommitmentMismatch)
        }
    }
}
