//! Construction-time wiring of a [`StorageManager`].
//!
//! Target names from configuration are resolved against the secondary
//! stores actually constructed; a name with no store is a [`ConfigError`]
//! returned from [`StorageManagerBuilder::build`], before any traffic.

use std::collections::HashMap;
use std::sync::Arc;

use quay_da::GeneratedKeyStore;
use quay_store::PrecomputedKeyStore;
use quay_types::{BackendTarget, BackendType};
use tracing::info;

use crate::error::{ConfigError, TargetRole};
use crate::manager::StorageManager;
use crate::secondary::SecondaryManager;

/// Secondary storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryConfig {
    /// Names of cache targets (write path).
    pub cache_targets: Vec<String>,
    /// Names of fallback targets (read path), in priority order.
    pub fallback_targets: Vec<String>,
    /// Write workers; zero writes inline after each Put.
    pub async_put_workers: usize,
    /// Bound of the write queue.
    pub queue_capacity: usize,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            cache_targets: Vec::new(),
            fallback_targets: Vec::new(),
            async_put_workers: 1,
            queue_capacity: 1024,
        }
    }
}

/// Builder for [`StorageManager`].
pub struct StorageManagerBuilder {
    active: BackendType,
    generated: Vec<Arc<dyn GeneratedKeyStore>>,
    secondaries: HashMap<BackendTarget, Arc<dyn PrecomputedKeyStore>>,
    secondary_config: SecondaryConfig,
}

impl StorageManagerBuilder {
    /// Start a builder whose Put path uses the `active` backend.
    pub fn new(active: BackendType) -> Self {
        Self {
            active,
            generated: Vec::new(),
            secondaries: HashMap::new(),
            secondary_config: SecondaryConfig::default(),
        }
    }

    /// Register a generated-key store. Every registered store serves Gets
    /// for its certificate version.
    pub fn with_generated_store(mut self, store: Arc<dyn GeneratedKeyStore>) -> Self {
        self.generated.push(store);
        self
    }

    /// Register a constructed secondary store under a target name.
    pub fn with_secondary(
        mut self,
        target: BackendTarget,
        store: Arc<dyn PrecomputedKeyStore>,
    ) -> Self {
        self.secondaries.insert(target, store);
        self
    }

    /// Set cache/fallback lists and worker settings.
    pub fn secondary_config(mut self, config: SecondaryConfig) -> Self {
        self.secondary_config = config;
        self
    }

    /// Resolve every name and assemble the manager.
    pub fn build(self) -> Result<StorageManager, ConfigError> {
        let mut readers = HashMap::new();
        for store in &self.generated {
            let version = store.cert_version();
            if readers.insert(version, store.clone()).is_some() {
                return Err(ConfigError::DuplicateStore(version));
            }
        }

        let active = self
            .generated
            .iter()
            .find(|s| s.backend_type() == self.active)
            .cloned()
            .ok_or(ConfigError::MissingBackend(self.active))?;

        let config = &self.secondary_config;
        let caches = self.resolve(TargetRole::Cache, &config.cache_targets)?;
        let fallbacks = self.resolve(TargetRole::Fallback, &config.fallback_targets)?;

        if config.async_put_workers > 0 && config.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }

        let secondary = SecondaryManager::new(
            caches,
            fallbacks,
            config.async_put_workers,
            config.queue_capacity,
        );

        info!(
            active = %self.active,
            readable = ?readers.keys().collect::<Vec<_>>(),
            caches = ?secondary.cache_types(),
            fallbacks = ?secondary.fallback_types(),
            workers = config.async_put_workers,
            "storage manager built"
        );

        Ok(StorageManager::new(active, readers, Arc::new(secondary)))
    }

    fn resolve(
        &self,
        role: TargetRole,
        names: &[String],
    ) -> Result<Vec<Arc<dyn PrecomputedKeyStore>>, ConfigError> {
        names
            .iter()
            .map(|name| {
                let target: BackendTarget = name.parse()?;
                self.secondaries
                    .get(&target)
                    .cloned()
                    .ok_or(ConfigError::TargetNotConstructed { role, target })
            })
            .collect()
    }
}
