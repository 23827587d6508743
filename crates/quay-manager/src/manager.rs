//! The storage manager: primary routing, read fallback, write-behind.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use quay_da::{DaError, GeneratedKeyStore};
use quay_types::{BackendType, CertVersion};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ManagerError;
use crate::secondary::{SecondaryManager, SecondaryStats, WriteJob};

/// Summary of how a manager is wired, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerStatus {
    /// Backend that issues new certificates.
    pub active: BackendType,
    /// Certificate versions this manager can read.
    pub readable: Vec<CertVersion>,
    /// Cache targets, in order.
    pub caches: Vec<BackendType>,
    /// Fallback targets, in priority order.
    pub fallbacks: Vec<BackendType>,
    /// Replication counters.
    pub secondary: SecondaryStats,
}

/// Front door for all blob traffic.
///
/// Put always goes to the single active generated-key store chosen at
/// construction. Get is routed by the certificate's version tag, so
/// certificates issued before a protocol upgrade stay readable as long as
/// their store is still registered.
pub struct StorageManager {
    active: Arc<dyn GeneratedKeyStore>,
    readers: HashMap<CertVersion, Arc<dyn GeneratedKeyStore>>,
    secondary: Arc<SecondaryManager>,
}

impl StorageManager {
    pub(crate) fn new(
        active: Arc<dyn GeneratedKeyStore>,
        readers: HashMap<CertVersion, Arc<dyn GeneratedKeyStore>>,
        secondary: Arc<SecondaryManager>,
    ) -> Self {
        Self {
            active,
            readers,
            secondary,
        }
    }

    /// Disperse a payload through the active store and return its
    /// certificate. Replication to secondary targets never affects the
    /// result.
    pub async fn put(&self, payload: &[u8]) -> Result<Bytes, ManagerError> {
        let cert = self.active.put(payload).await?;

        if self.secondary.enabled() {
            let job = WriteJob::new(
                &cert,
                Bytes::copy_from_slice(payload),
                self.active.backend_type(),
            );
            debug!(key = %job.key, "submitting secondary write");
            self.secondary.submit(job).await;
        }

        Ok(cert)
    }

    /// Return the verified payload for a certificate.
    ///
    /// Cache targets are read first and serve any copy that verifies. Then
    /// the primary store is asked; its decode failures are returned
    /// immediately, and any other failure walks the fallback targets. If
    /// nothing serves a verified copy the primary error is returned with
    /// the per-target outcomes attached.
    pub async fn get(&self, cert: &[u8]) -> Result<Bytes, ManagerError> {
        let store = self.reader_for(cert)?;

        let mut misses = Vec::new();
        if self.secondary.has_caches() {
            match self.secondary.read_caches(cert, store.as_ref()).await {
                Ok(payload) => return Ok(payload),
                Err(cache_misses) => misses = cache_misses,
            }
        }

        let primary = match store.get(cert).await {
            Ok(payload) => return Ok(payload),
            Err(e) if e.is_decode() => return Err(e.into()),
            Err(e) => e,
        };

        warn!(
            backend = %store.backend_type(),
            error = %primary,
            fallbacks = self.secondary.fallback_types().len(),
            "primary read failed"
        );

        if self.secondary.has_fallbacks() {
            match self.secondary.read_fallbacks(cert, store.as_ref()).await {
                Ok(payload) => return Ok(payload),
                Err(fallback_misses) => misses.extend(fallback_misses),
            }
        }

        Err(ManagerError::ReadFailed { primary, misses })
    }

    /// Verify a certificate, and optionally a payload against it, with the
    /// store for the certificate's version.
    pub async fn verify(&self, cert: &[u8], payload: Option<&[u8]>) -> Result<(), ManagerError> {
        let store = self.reader_for(cert)?;
        store.verify(cert, payload).await?;
        Ok(())
    }

    /// Start the secondary write workers. Returns no handles when writes are
    /// synchronous or secondary storage is disabled.
    pub fn spawn_write_workers(&self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        if !self.secondary.enabled() {
            return Vec::new();
        }
        self.secondary.spawn_workers(shutdown_rx)
    }

    /// Backend that issues new certificates.
    pub fn active_backend(&self) -> BackendType {
        self.active.backend_type()
    }

    /// The secondary manager.
    pub fn secondary(&self) -> &Arc<SecondaryManager> {
        &self.secondary
    }

    /// Wiring and counters.
    pub fn status(&self) -> ManagerStatus {
        let mut readable: Vec<CertVersion> = self.readers.keys().copied().collect();
        readable.sort();
        ManagerStatus {
            active: self.active.backend_type(),
            readable,
            caches: self.secondary.cache_types(),
            fallbacks: self.secondary.fallback_types(),
            secondary: self.secondary.stats(),
        }
    }

    fn reader_for(&self, cert: &[u8]) -> Result<&Arc<dyn GeneratedKeyStore>, ManagerError> {
        let version = CertVersion::of(cert).map_err(DaError::from)?;
        self.readers
            .get(&version)
            .ok_or(ManagerError::NoStoreForVersion(version))
    }
}
