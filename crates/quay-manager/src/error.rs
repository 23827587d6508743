//! Error types for the storage manager.

use std::fmt;

use quay_da::DaError;
use quay_store::StoreError;
use quay_types::{AddressError, BackendTarget, BackendType, CertVersion, UnknownBackend};

/// Errors returned by [`StorageManager`](crate::StorageManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The generated-key store failed and no fallback applies.
    #[error(transparent)]
    Da(#[from] DaError),

    /// Neither a cache, the primary store nor a fallback target produced a
    /// verified copy. Displays as the primary error alone.
    #[error("{primary}")]
    ReadFailed {
        /// Error from the generated-key store, which takes precedence.
        #[source]
        primary: DaError,
        /// What each secondary target returned: caches, then fallbacks.
        misses: Vec<TargetMiss>,
    },

    /// The certificate was issued by a protocol generation this manager
    /// was not built with.
    #[error("no store configured for {0} certificates")]
    NoStoreForVersion(CertVersion),
}

impl ManagerError {
    /// The generated-key store error behind this failure, if any.
    pub fn primary(&self) -> Option<&DaError> {
        match self {
            Self::Da(e) | Self::ReadFailed { primary: e, .. } => Some(e),
            Self::NoStoreForVersion(_) => None,
        }
    }

    /// Per-target diagnostics from the secondary reads; empty if none ran.
    pub fn misses(&self) -> &[TargetMiss] {
        match self {
            Self::ReadFailed { misses, .. } => misses,
            _ => &[],
        }
    }
}

/// One secondary target that did not serve a read.
#[derive(Debug)]
pub struct TargetMiss {
    /// The target consulted.
    pub target: BackendType,
    /// Whether it was consulted as a cache or a fallback.
    pub role: TargetRole,
    /// Why it did not serve the read.
    pub reason: MissReason,
}

impl fmt::Display for TargetMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.role, self.target, self.reason)
    }
}

/// Why a secondary target did not serve a read.
#[derive(Debug, thiserror::Error)]
pub enum MissReason {
    /// The target has no entry for the key.
    #[error("not found")]
    Missing,

    /// The target could not be read.
    #[error("unavailable: {0}")]
    Unavailable(#[source] StoreError),

    /// The target returned bytes that do not match the certificate.
    #[error("copy failed verification: {0}")]
    Unverified(#[source] DaError),
}

/// Which list a secondary target was named in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRole {
    /// Read before the primary store.
    Cache,
    /// Read after the primary store fails.
    Fallback,
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => f.write_str("cache"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Misconfiguration detected before the manager serves traffic.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A target name that is not a known secondary backend.
    #[error("unknown secondary target: {0}")]
    UnknownTarget(#[from] UnknownBackend),

    /// A target name whose backend was not constructed.
    #[error("{role} target {target:?} names a backend that was not constructed")]
    TargetNotConstructed {
        /// List the name appeared in.
        role: TargetRole,
        /// The unresolved target.
        target: BackendTarget,
    },

    /// The active backend has no store.
    #[error("active backend {0} has no store")]
    MissingBackend(BackendType),

    /// Two stores were registered for the same certificate version.
    #[error("more than one store registered for {0} certificates")]
    DuplicateStore(CertVersion),

    /// Write workers were requested with a zero-capacity queue.
    #[error("secondary write queue capacity must be at least 1")]
    ZeroQueueCapacity,

    /// A put retry budget of zero.
    #[error("{0} put retries must be at least 1")]
    ZeroRetries(BackendType),

    /// A payload limit larger than a blob envelope can frame.
    #[error("max blob size {size} exceeds the envelope limit of {limit} bytes")]
    BlobSizeTooLarge {
        /// Configured limit.
        size: usize,
        /// Largest limit accepted.
        limit: usize,
    },

    /// The cert-verifier address does not parse.
    #[error("invalid cert verifier address: {0}")]
    InvalidAddress(#[from] AddressError),
}
