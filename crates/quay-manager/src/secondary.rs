//! Secondary storage: write-behind replication and read fallback.
//!
//! Every successful primary Put becomes a [`WriteJob`] on a bounded queue.
//! A fixed pool of workers shares the queue's receiving end; each job is
//! written once to every cache and fallback target and then discarded,
//! whatever the outcome. A full queue drops the job rather than block the
//! client.
//!
//! On the read path the cache targets are consulted before the primary
//! store and the fallback targets after it fails, one at a time in
//! configured order. The first copy that verifies against the certificate
//! wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use quay_da::GeneratedKeyStore;
use quay_store::PrecomputedKeyStore;
use quay_types::{BackendType, BlobKey};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{MissReason, TargetMiss, TargetRole};

/// A pending replication of one blob.
#[derive(Debug, Clone)]
pub struct WriteJob {
    /// Secondary-store key derived from the certificate.
    pub key: BlobKey,
    /// The payload to replicate.
    pub value: Bytes,
    /// Backend that issued the certificate.
    pub origin: BackendType,
    /// When the job was created.
    pub enqueued_at: Instant,
}

impl WriteJob {
    /// Create a job keyed by the certificate's content hash.
    pub fn new(cert: &[u8], value: Bytes, origin: BackendType) -> Self {
        Self {
            key: BlobKey::from_data(cert),
            value,
            origin,
            enqueued_at: Instant::now(),
        }
    }
}

/// Point-in-time replication counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecondaryStats {
    /// Jobs waiting in the queue.
    pub queued: usize,
    /// Jobs dropped because the queue was full.
    pub dropped: u64,
    /// Target writes that succeeded.
    pub writes_ok: u64,
    /// Target writes that failed.
    pub writes_failed: u64,
}

/// Cache and fallback targets plus the write queue feeding them.
pub struct SecondaryManager {
    caches: Vec<Arc<dyn PrecomputedKeyStore>>,
    fallbacks: Vec<Arc<dyn PrecomputedKeyStore>>,
    /// `caches` followed by `fallbacks`, each store listed once.
    write_targets: Vec<Arc<dyn PrecomputedKeyStore>>,
    workers: usize,
    tx: mpsc::Sender<WriteJob>,
    rx: Arc<Mutex<mpsc::Receiver<WriteJob>>>,
    dropped: AtomicU64,
    writes_ok: AtomicU64,
    writes_failed: AtomicU64,
}

impl SecondaryManager {
    /// Create a manager over resolved targets.
    ///
    /// `workers == 0` selects inline writes; the queue is then unused.
    pub fn new(
        caches: Vec<Arc<dyn PrecomputedKeyStore>>,
        fallbacks: Vec<Arc<dyn PrecomputedKeyStore>>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let mut write_targets: Vec<Arc<dyn PrecomputedKeyStore>> = Vec::new();
        for store in caches.iter().chain(fallbacks.iter()) {
            if !write_targets.iter().any(|t| Arc::ptr_eq(t, store)) {
                write_targets.push(store.clone());
            }
        }

        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        Self {
            caches,
            fallbacks,
            write_targets,
            workers,
            tx,
            rx: Arc::new(Mutex::new(rx)),
            dropped: AtomicU64::new(0),
            writes_ok: AtomicU64::new(0),
            writes_failed: AtomicU64::new(0),
        }
    }

    /// A manager with no targets.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Vec::new(), 0, 1)
    }

    /// Whether at least one cache or fallback target is configured.
    pub fn enabled(&self) -> bool {
        !self.caches.is_empty() || !self.fallbacks.is_empty()
    }

    /// Whether reads try a cache before the primary store.
    pub fn has_caches(&self) -> bool {
        !self.caches.is_empty()
    }

    /// Whether the read path has anywhere to fall back to.
    pub fn has_fallbacks(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    /// Whether writes go through the queue rather than inline.
    pub fn is_async(&self) -> bool {
        self.workers > 0
    }

    /// Configured worker count.
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Backend types of the cache targets, in order.
    pub fn cache_types(&self) -> Vec<BackendType> {
        self.caches.iter().map(|s| s.backend_type()).collect()
    }

    /// Backend types of the fallback targets, in priority order.
    pub fn fallback_types(&self) -> Vec<BackendType> {
        self.fallbacks.iter().map(|s| s.backend_type()).collect()
    }

    /// Current counters.
    pub fn stats(&self) -> SecondaryStats {
        SecondaryStats {
            queued: self.tx.max_capacity() - self.tx.capacity(),
            dropped: self.dropped.load(Ordering::Relaxed),
            writes_ok: self.writes_ok.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
        }
    }

    /// Replicate a job: queued when workers run, inline otherwise.
    ///
    /// Never fails; secondary trouble is only logged.
    pub async fn submit(&self, job: WriteJob) {
        if self.is_async() {
            self.try_enqueue(job);
        } else {
            self.write_to_targets(&job).await;
        }
    }

    /// Queue a job without waiting. Returns `false` if it was dropped.
    pub fn try_enqueue(&self, job: WriteJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = %job.key,
                    capacity = self.tx.max_capacity(),
                    "secondary write queue full, dropping job"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(key = %job.key, "secondary write queue closed, dropping job");
                false
            }
        }
    }

    /// Write one job to every target, logging failures.
    pub async fn write_to_targets(&self, job: &WriteJob) {
        for target in &self.write_targets {
            let backend = target.backend_type();
            match target.put(job.key, job.value.clone()).await {
                Ok(()) => {
                    self.writes_ok.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %job.key, %backend, origin = %job.origin, "secondary write ok");
                }
                Err(e) => {
                    self.writes_failed.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %job.key, %backend, error = %e, "secondary write failed");
                }
            }
        }
    }

    /// Start the configured number of write workers.
    pub fn spawn_workers(self: &Arc<Self>, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        (0..self.workers)
            .map(|worker_id| {
                let this = Arc::clone(self);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move { this.run_write_worker(worker_id, shutdown_rx).await })
            })
            .collect()
    }

    /// Drain the shared queue until shutdown.
    ///
    /// Shutdown is checked between jobs: a job already taken off the queue
    /// is written out, anything still queued is abandoned.
    pub async fn run_write_worker(&self, worker_id: usize, mut shutdown_rx: watch::Receiver<bool>) {
        info!(worker_id, "secondary write worker started");

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            let job = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                job = self.next_job() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            debug!(
                worker_id,
                key = %job.key,
                waited_ms = job.enqueued_at.elapsed().as_millis() as u64,
                "replicating blob"
            );
            self.write_to_targets(&job).await;
        }

        info!(worker_id, "secondary write worker stopped");
    }

    async fn next_job(&self) -> Option<WriteJob> {
        self.rx.lock().await.recv().await
    }

    /// Walk the cache targets, in order, for a verified copy of a
    /// certificate's payload.
    pub async fn read_caches(
        &self,
        cert: &[u8],
        verifier: &dyn GeneratedKeyStore,
    ) -> Result<Bytes, Vec<TargetMiss>> {
        self.read_verified(&self.caches, TargetRole::Cache, cert, verifier)
            .await
    }

    /// Walk the fallback targets, in priority order, for a verified copy.
    /// A store also listed as a cache has already been read and is skipped.
    pub async fn read_fallbacks(
        &self,
        cert: &[u8],
        verifier: &dyn GeneratedKeyStore,
    ) -> Result<Bytes, Vec<TargetMiss>> {
        let unread: Vec<_> = self
            .fallbacks
            .iter()
            .filter(|f| !self.caches.iter().any(|c| Arc::ptr_eq(c, *f)))
            .cloned()
            .collect();
        self.read_verified(&unread, TargetRole::Fallback, cert, verifier)
            .await
    }

    /// A hit is returned only after `verifier` accepts it against the
    /// certificate; otherwise every target's outcome is returned.
    async fn read_verified(
        &self,
        targets: &[Arc<dyn PrecomputedKeyStore>],
        role: TargetRole,
        cert: &[u8],
        verifier: &dyn GeneratedKeyStore,
    ) -> Result<Bytes, Vec<TargetMiss>> {
        let key = BlobKey::from_data(cert);
        let mut misses = Vec::with_capacity(targets.len());

        for target in targets {
            let backend = target.backend_type();
            let reason = match target.get(key).await {
                Ok(Some(payload)) => match verifier.verify(cert, Some(&payload)).await {
                    Ok(()) => {
                        info!(%key, %backend, %role, "served read from secondary");
                        return Ok(payload);
                    }
                    Err(e) => {
                        warn!(
                            %key,
                            %backend,
                            %role,
                            error = %e,
                            "secondary copy failed verification"
                        );
                        MissReason::Unverified(e)
                    }
                },
                Ok(None) => {
                    debug!(%key, %backend, %role, "secondary miss");
                    MissReason::Missing
                }
                Err(e) => {
                    warn!(%key, %backend, %role, error = %e, "secondary read failed");
                    MissReason::Unavailable(e)
                }
            };
            misses.push(TargetMiss {
                target: backend,
                role,
                reason,
            });
        }

        Err(misses)
    }
}
