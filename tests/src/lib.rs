//! Shared test harness for quay integration tests.
//!
//! Provides [`TestProxy`]: a storage manager over the simulated DA network
//! with fault-injectable secondary targets, and [`ScriptedDisperser`], a
//! second-generation disperser that fails on a script before delegating.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use quay_da::{
    CertificationStatus, DisperseError, MemDa, MemDaConfig, PayloadDisperser, RequestId, V1Config,
    V1Store, V2Config, V2Store,
};
use quay_manager::{SecondaryConfig, StorageManager, StorageManagerBuilder};
use quay_store::{FileStore, FlakyStore, MemoryStore, PrecomputedKeyStore};
use quay_types::{BackendTarget, BackendType};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Capacity of memory targets in tests.
pub const MEMORY_TARGET_BYTES: u64 = 256 * 1024 * 1024;

/// Generate deterministic, non-repeating test data.
pub fn test_data(size: usize, seed: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xDEAD_BEEF ^ seed;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

/// First-generation parameters with millisecond polling.
pub fn fast_v1_config() -> V1Config {
    V1Config {
        status_poll_interval: Duration::from_millis(1),
        rate_limit_backoff: Duration::from_millis(5),
        ..V1Config::default()
    }
}

/// Second-generation parameters with millisecond polling.
pub fn fast_v2_config() -> V2Config {
    V2Config {
        blob_status_poll_interval: Duration::from_millis(1),
        rate_limit_backoff: Duration::from_millis(5),
        ..V2Config::default()
    }
}

// =========================================================================
// Scripted disperser
// =========================================================================

/// A [`PayloadDisperser`] that answers submissions from a script of errors
/// and forwards to the simulated network once the script runs out.
pub struct ScriptedDisperser {
    inner: Arc<MemDa>,
    script: Mutex<VecDeque<DisperseError>>,
    submissions: AtomicUsize,
}

impl ScriptedDisperser {
    pub fn new(inner: Arc<MemDa>, script: impl IntoIterator<Item = DisperseError>) -> Self {
        Self {
            inner,
            script: Mutex::new(script.into_iter().collect()),
            submissions: AtomicUsize::new(0),
        }
    }

    /// Submissions seen so far, scripted failures included.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PayloadDisperser for ScriptedDisperser {
    async fn submit_blob(&self, blob: Bytes, blob_version: u16) -> Result<RequestId, DisperseError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().expect("lock poisoned").pop_front();
        if let Some(err) = scripted {
            debug!(%err, "scripted submission failure");
            return Err(err);
        }
        self.inner.submit_blob(blob, blob_version).await
    }

    async fn certification_status(
        &self,
        request: &RequestId,
    ) -> Result<CertificationStatus, DisperseError> {
        self.inner.certification_status(request).await
    }
}

// =========================================================================
// Test proxy
// =========================================================================

/// Where a secondary target keeps its data.
pub enum TargetBacking<'a> {
    /// A fresh [`MemoryStore`].
    Memory,
    /// A [`FileStore`] rooted in the given directory.
    Dir(&'a std::path::Path),
}

/// Builder for a [`TestProxy`].
pub struct TestProxyBuilder {
    active: BackendType,
    da: Option<Arc<MemDa>>,
    v2_disperser: Option<Arc<dyn PayloadDisperser>>,
    v1_config: V1Config,
    v2_config: V2Config,
    register_v1: bool,
    targets: HashMap<BackendTarget, Arc<FlakyStore>>,
    secondary: SecondaryConfig,
}

impl TestProxyBuilder {
    /// Share an existing simulated network, e.g. across an upgrade.
    pub fn da(mut self, da: Arc<MemDa>) -> Self {
        self.da = Some(da);
        self
    }

    /// Submit second-generation blobs through `disperser`.
    pub fn v2_disperser(mut self, disperser: Arc<dyn PayloadDisperser>) -> Self {
        self.v2_disperser = Some(disperser);
        self
    }

    pub fn v1_config(mut self, config: V1Config) -> Self {
        self.v1_config = config;
        self
    }

    pub fn v2_config(mut self, config: V2Config) -> Self {
        self.v2_config = config;
        self
    }

    /// Leave the first-generation store out, so V1 certificates are
    /// unreadable.
    pub fn without_v1(mut self) -> Self {
        self.register_v1 = false;
        self
    }

    /// Register a secondary target.
    pub fn target(mut self, target: BackendTarget, backing: TargetBacking<'_>) -> Self {
        let inner: Arc<dyn PrecomputedKeyStore> = match backing {
            TargetBacking::Memory => Arc::new(MemoryStore::new(MEMORY_TARGET_BYTES)),
            TargetBacking::Dir(dir) => Arc::new(FileStore::new(dir).expect("file store")),
        };
        self.targets
            .insert(target, Arc::new(FlakyStore::new(inner)));
        self
    }

    /// Name cache and fallback targets and size the worker pool.
    pub fn secondary(mut self, config: SecondaryConfig) -> Self {
        self.secondary = config;
        self
    }

    /// Build the manager and start its write workers.
    pub fn build(self) -> TestProxy {
        let da = self
            .da
            .unwrap_or_else(|| Arc::new(MemDa::new(MemDaConfig::default())));
        let v2_disperser = self
            .v2_disperser
            .unwrap_or_else(|| da.clone() as Arc<dyn PayloadDisperser>);

        let mut builder = StorageManagerBuilder::new(self.active).with_generated_store(Arc::new(
            V2Store::new(v2_disperser, da.clone(), da.clone(), self.v2_config),
        ));
        if self.register_v1 {
            builder = builder.with_generated_store(Arc::new(V1Store::new(
                da.clone(),
                da.clone(),
                self.v1_config,
            )));
        }
        for (target, store) in &self.targets {
            builder = builder.with_secondary(*target, store.clone());
        }

        let manager = Arc::new(
            builder
                .secondary_config(self.secondary)
                .build()
                .expect("manager config"),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = manager.spawn_write_workers(shutdown_rx);

        TestProxy {
            da,
            manager,
            targets: self.targets,
            shutdown_tx,
            workers,
        }
    }
}

/// A running storage manager with handles to everything behind it.
pub struct TestProxy {
    pub da: Arc<MemDa>,
    pub manager: Arc<StorageManager>,
    targets: HashMap<BackendTarget, Arc<FlakyStore>>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl TestProxy {
    /// Start a builder whose Put path uses `active`.
    pub fn builder(active: BackendType) -> TestProxyBuilder {
        TestProxyBuilder {
            active,
            da: None,
            v2_disperser: None,
            v1_config: fast_v1_config(),
            v2_config: fast_v2_config(),
            register_v1: true,
            targets: HashMap::new(),
            secondary: SecondaryConfig {
                async_put_workers: 0,
                ..SecondaryConfig::default()
            },
        }
    }

    /// The fault-injection wrapper around a registered target.
    pub fn target(&self, target: BackendTarget) -> &Arc<FlakyStore> {
        &self.targets[&target]
    }

    /// Poll until the queue is empty and `target_writes` individual target
    /// writes have been attempted, or a timeout passes.
    pub async fn wait_for_writes(&self, target_writes: u64) -> bool {
        for _ in 0..400 {
            let stats = self.manager.secondary().stats();
            if stats.queued == 0 && stats.writes_ok + stats.writes_failed >= target_writes {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    /// Signal the write workers and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for worker in self.workers {
            worker.await.expect("worker panicked");
        }
    }
}
