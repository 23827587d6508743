//! In-memory secondary storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use quay_types::{BackendType, BlobKey};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::PrecomputedKeyStore;

/// In-memory store backed by a `RwLock<HashMap>`.
///
/// Serves as the low-latency cache target. Tracks total bytes stored
/// against a configurable maximum and rejects writes that would exceed it.
pub struct MemoryStore {
    blobs: RwLock<HashMap<BlobKey, Bytes>>,
    max_bytes: u64,
}

impl MemoryStore {
    /// Create a new in-memory store with the given capacity limit.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            max_bytes,
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently stored.
    pub fn used_bytes(&self) -> u64 {
        let map = self.blobs.read().expect("lock poisoned");
        Self::used_bytes_unlocked(&map)
    }

    /// Return a reference to the inner map (for testing purposes).
    #[cfg(test)]
    pub(crate) fn inner(&self) -> &RwLock<HashMap<BlobKey, Bytes>> {
        &self.blobs
    }

    fn used_bytes_unlocked(map: &HashMap<BlobKey, Bytes>) -> u64 {
        map.values().map(|v| v.len() as u64).sum()
    }
}

#[async_trait::async_trait]
impl PrecomputedKeyStore for MemoryStore {
    async fn put(&self, key: BlobKey, value: Bytes) -> Result<(), StoreError> {
        let mut map = self.blobs.write().expect("lock poisoned");
        let used = Self::used_bytes_unlocked(&map);
        let value_len = value.len() as u64;

        // Replacing an existing entry frees its bytes first.
        let existing_len = map.get(&key).map_or(0, |v| v.len() as u64);
        let net_increase = value_len.saturating_sub(existing_len);

        if used + net_increase > self.max_bytes {
            return Err(StoreError::CapacityExceeded {
                needed: net_increase,
                available: self.max_bytes.saturating_sub(used),
            });
        }

        debug!(%key, size = value.len(), "storing blob in memory");
        map.insert(key, value);
        Ok(())
    }

    async fn get(&self, key: BlobKey) -> Result<Option<Bytes>, StoreError> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(&key).cloned())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}
