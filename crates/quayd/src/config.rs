//! TOML configuration for the quay daemon.
//!
//! Every section is optional. Effective values come from the accessors,
//! which fill in defaults and validate what the stores cannot.

use std::path::{Path, PathBuf};
use std::time::Duration;

use quay_da::{DEFAULT_MAX_BLOB_SIZE, MAX_PAYLOAD_LEN, MemDaConfig, V1Config, V2Config};
use quay_manager::{ConfigError, SecondaryConfig};
use quay_types::{BackendType, ContractAddress};
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QuaydConfig {
    /// HTTP listener.
    pub server: ServerSection,
    /// Generated-key stores.
    pub da: DaSection,
    /// Simulated DA network.
    pub memstore: MemstoreSection,
    /// Cache and fallback targets.
    pub secondary: SecondarySection,
    /// Precomputed-key backends.
    pub storage: StorageSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[server]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address for the HTTP API.
    pub listen_addr: String,
    /// Largest request body accepted. Defaults to the max blob size plus
    /// some headroom.
    pub max_body_bytes: Option<usize>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3100".to_string(),
            max_body_bytes: None,
        }
    }
}

/// `[da]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DaSection {
    /// Protocol generation that issues new certificates: `"v1"` or `"v2"`.
    pub backend: String,
    /// Largest payload accepted by either store.
    pub max_blob_size_bytes: Option<usize>,
    /// Use the in-process simulated network.
    pub memstore: bool,
    /// First-generation store.
    pub v1: V1Section,
    /// Second-generation store.
    pub v2: V2Section,
}

impl Default for DaSection {
    fn default() -> Self {
        Self {
            backend: "v2".to_string(),
            max_blob_size_bytes: None,
            memstore: true,
            v1: V1Section::default(),
            v2: V2Section::default(),
        }
    }
}

/// `[da.v1]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct V1Section {
    pub put_retries: Option<u32>,
    pub status_query_timeout_ms: Option<u64>,
    pub status_poll_interval_ms: Option<u64>,
    pub confirmation_depth: Option<u64>,
    pub rate_limit_backoff_ms: Option<u64>,
}

/// `[da.v2]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct V2Section {
    pub put_retries: Option<u32>,
    /// Hex address of the cert-verifier contract, with or without `0x`.
    pub cert_verifier_address: Option<String>,
    pub blob_version: Option<u16>,
    pub disperse_blob_timeout_ms: Option<u64>,
    pub blob_certified_timeout_ms: Option<u64>,
    pub blob_status_poll_interval_ms: Option<u64>,
    pub rate_limit_backoff_ms: Option<u64>,
}

/// `[memstore]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MemstoreSection {
    pub put_latency_ms: u64,
    pub get_latency_ms: u64,
}

/// `[secondary]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SecondarySection {
    /// Targets written after every successful Put.
    pub cache_targets: Vec<String>,
    /// Targets read, in order, when the primary read fails.
    pub fallback_targets: Vec<String>,
    /// Background write workers; 0 writes inline. Defaults to 1.
    pub async_put_workers: Option<usize>,
    /// Pending write jobs held before new ones are dropped.
    pub queue_capacity: Option<usize>,
}

/// `[storage]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory for the file target. The target exists only when set.
    pub file_dir: Option<PathBuf>,
    /// Capacity of the memory target. The target exists only when non-zero.
    pub memory_max_bytes: u64,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl QuaydConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: QuaydConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Backend that issues new certificates.
    pub fn active_backend(&self) -> anyhow::Result<BackendType> {
        let backend: BackendType = self.da.backend.parse()?;
        anyhow::ensure!(
            !backend.is_secondary(),
            "da.backend must be \"v1\" or \"v2\", got {:?}",
            self.da.backend
        );
        Ok(backend)
    }

    /// Effective maximum payload size.
    pub fn max_blob_size(&self) -> usize {
        self.da.max_blob_size_bytes.unwrap_or(DEFAULT_MAX_BLOB_SIZE)
    }

    /// Maximum payload size, rejected when a blob envelope cannot frame it.
    fn checked_max_blob_size(&self) -> Result<usize, ConfigError> {
        let size = self.max_blob_size();
        if size > MAX_PAYLOAD_LEN {
            return Err(ConfigError::BlobSizeTooLarge {
                size,
                limit: MAX_PAYLOAD_LEN,
            });
        }
        Ok(size)
    }

    /// Effective request body limit: the max blob size plus 1 MiB.
    pub fn max_body_bytes(&self) -> usize {
        self.server
            .max_body_bytes
            .unwrap_or_else(|| self.max_blob_size().saturating_add(1024 * 1024))
    }

    /// Effective first-generation store parameters.
    pub fn v1_config(&self) -> Result<V1Config, ConfigError> {
        let d = V1Config::default();
        let s = &self.da.v1;
        let config = V1Config {
            put_retries: s.put_retries.unwrap_or(d.put_retries),
            status_query_timeout: ms_or(s.status_query_timeout_ms, d.status_query_timeout),
            status_poll_interval: ms_or(s.status_poll_interval_ms, d.status_poll_interval),
            confirmation_depth: s.confirmation_depth.unwrap_or(d.confirmation_depth),
            rate_limit_backoff: ms_or(s.rate_limit_backoff_ms, d.rate_limit_backoff),
            max_blob_size: self.checked_max_blob_size()?,
        };
        if config.put_retries == 0 {
            return Err(ConfigError::ZeroRetries(BackendType::DaV1));
        }
        Ok(config)
    }

    /// Effective second-generation store parameters.
    pub fn v2_config(&self) -> Result<V2Config, ConfigError> {
        let d = V2Config::default();
        let s = &self.da.v2;
        let config = V2Config {
            put_retries: s.put_retries.unwrap_or(d.put_retries),
            cert_verifier_address: self.cert_verifier_address()?,
            blob_version: s.blob_version.unwrap_or(d.blob_version),
            disperse_blob_timeout: ms_or(s.disperse_blob_timeout_ms, d.disperse_blob_timeout),
            blob_certified_timeout: ms_or(s.blob_certified_timeout_ms, d.blob_certified_timeout),
            blob_status_poll_interval: ms_or(
                s.blob_status_poll_interval_ms,
                d.blob_status_poll_interval,
            ),
            rate_limit_backoff: ms_or(s.rate_limit_backoff_ms, d.rate_limit_backoff),
            max_blob_size: self.checked_max_blob_size()?,
        };
        if config.put_retries == 0 {
            return Err(ConfigError::ZeroRetries(BackendType::DaV2));
        }
        Ok(config)
    }

    /// Effective cert-verifier address. Defaults to the zero address.
    pub fn cert_verifier_address(&self) -> Result<ContractAddress, ConfigError> {
        match &self.da.v2.cert_verifier_address {
            Some(s) => Ok(s.parse()?),
            None => Ok(ContractAddress::default()),
        }
    }

    /// Simulated network settings. Certificates are checked against the
    /// configured verifier address, so the network deploys there.
    pub fn memda_config(&self) -> Result<MemDaConfig, ConfigError> {
        Ok(MemDaConfig {
            put_latency: Duration::from_millis(self.memstore.put_latency_ms),
            get_latency: Duration::from_millis(self.memstore.get_latency_ms),
            cert_verifier_address: self.cert_verifier_address()?,
            ..MemDaConfig::default()
        })
    }

    /// Effective secondary storage settings.
    pub fn secondary_config(&self) -> SecondaryConfig {
        let d = SecondaryConfig::default();
        SecondaryConfig {
            cache_targets: self.secondary.cache_targets.clone(),
            fallback_targets: self.secondary.fallback_targets.clone(),
            async_put_workers: self
                .secondary
                .async_put_workers
                .unwrap_or(d.async_put_workers),
            queue_capacity: self.secondary.queue_capacity.unwrap_or(d.queue_capacity),
        }
    }
}

fn ms_or(ms: Option<u64>, default: Duration) -> Duration {
    ms.map(Duration::from_millis).unwrap_or(default)
}
