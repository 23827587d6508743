//! Shared test utilities for quay-manager tests.

use std::sync::Arc;
use std::time::Duration;

use quay_da::{GeneratedKeyStore, MemDa, MemDaConfig, V1Config, V1Store, V2Config, V2Store};
use quay_store::{FileStore, FlakyStore, MemoryStore, PrecomputedKeyStore};
use quay_types::{BackendTarget, BackendType};

use crate::builder::{SecondaryConfig, StorageManagerBuilder};
use crate::manager::StorageManager;

pub const TEST_MAX_BYTES: u64 = 64 * 1024 * 1024;

/// Generate deterministic, non-repeating test data.
pub fn test_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xC0FF_EE11;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

pub fn memda() -> Arc<MemDa> {
    Arc::new(MemDa::new(MemDaConfig::default()))
}

pub fn v1_store(da: &Arc<MemDa>) -> Arc<dyn GeneratedKeyStore> {
    Arc::new(V1Store::new(
        da.clone(),
        da.clone(),
        V1Config {
            status_poll_interval: Duration::from_millis(1),
            ..V1Config::default()
        },
    ))
}

pub fn v2_store(da: &Arc<MemDa>) -> Arc<dyn GeneratedKeyStore> {
    Arc::new(V2Store::new(
        da.clone(),
        da.clone(),
        da.clone(),
        V2Config {
            blob_status_poll_interval: Duration::from_millis(1),
            ..V2Config::default()
        },
    ))
}

/// A flaky wrapper around a fresh in-memory store.
pub fn flaky_memory() -> Arc<FlakyStore> {
    Arc::new(FlakyStore::new(Arc::new(MemoryStore::new(TEST_MAX_BYTES))))
}

/// A flaky wrapper around a file store in `dir`.
pub fn flaky_file(dir: &tempfile::TempDir) -> Arc<FlakyStore> {
    Arc::new(FlakyStore::new(Arc::new(FileStore::new(dir.path()).unwrap())))
}

/// Secondary settings naming the given targets, with inline writes.
pub fn sync_secondary(caches: &[&str], fallbacks: &[&str]) -> SecondaryConfig {
    SecondaryConfig {
        cache_targets: caches.iter().map(|s| s.to_string()).collect(),
        fallback_targets: fallbacks.iter().map(|s| s.to_string()).collect(),
        async_put_workers: 0,
        queue_capacity: 16,
    }
}

/// Build a V2-active manager over `da` with both generations readable.
pub fn manager_with(
    da: &Arc<MemDa>,
    config: SecondaryConfig,
    secondaries: Vec<(BackendTarget, Arc<dyn PrecomputedKeyStore>)>,
) -> StorageManager {
    let mut builder = StorageManagerBuilder::new(BackendType::DaV2)
        .with_generated_store(v1_store(da))
        .with_generated_store(v2_store(da))
        .secondary_config(config);
    for (target, store) in secondaries {
        builder = builder.with_secondary(target, store);
    }
    builder.build().unwrap()
}

/// Poll `cond` until it holds or a second passes.
pub async fn wait_for(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// Upcast a flaky store for registration with the builder.
pub fn as_secondary(store: &Arc<FlakyStore>) -> Arc<dyn PrecomputedKeyStore> {
    store.clone()
}
