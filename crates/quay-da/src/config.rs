//! Per-generation store parameters.

use std::time::Duration;

use quay_types::ContractAddress;

use crate::retry::RetryPolicy;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_BLOB_SIZE: usize = 16 * 1024 * 1024;

/// Parameters for the first-generation store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V1Config {
    /// Attempts per Put, each a full submit-and-poll cycle.
    pub put_retries: u32,
    /// How long one attempt may poll before it times out.
    pub status_query_timeout: Duration,
    /// Pause between status polls.
    pub status_poll_interval: Duration,
    /// Blocks a batch must be buried under before a certificate verifies.
    pub confirmation_depth: u64,
    /// Pause before retrying a rate-limited attempt.
    pub rate_limit_backoff: Duration,
    /// Largest payload accepted.
    pub max_blob_size: usize,
}

impl V1Config {
    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.put_retries,
            rate_limit_backoff: self.rate_limit_backoff,
        }
    }
}

impl Default for V1Config {
    fn default() -> Self {
        Self {
            put_retries: 3,
            status_query_timeout: Duration::from_secs(30),
            status_poll_interval: Duration::from_secs(1),
            confirmation_depth: 0,
            rate_limit_backoff: Duration::from_secs(1),
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

/// Parameters for the second-generation store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2Config {
    /// Attempts per Put.
    pub put_retries: u32,
    /// Cert-verifier contract certificates are checked against.
    pub cert_verifier_address: ContractAddress,
    /// Blob parameters version requested at dispersal.
    pub blob_version: u16,
    /// How long the submit call of one attempt may take.
    pub disperse_blob_timeout: Duration,
    /// How long one attempt may wait for certification.
    pub blob_certified_timeout: Duration,
    /// Pause between certification polls.
    pub blob_status_poll_interval: Duration,
    /// Pause before retrying a rate-limited attempt.
    pub rate_limit_backoff: Duration,
    /// Largest payload accepted.
    pub max_blob_size: usize,
}

impl V2Config {
    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.put_retries,
            rate_limit_backoff: self.rate_limit_backoff,
        }
    }
}

impl Default for V2Config {
    fn default() -> Self {
        Self {
            put_retries: 3,
            cert_verifier_address: ContractAddress::default(),
            blob_version: 0,
            disperse_blob_timeout: Duration::from_secs(120),
            blob_certified_timeout: Duration::from_secs(30),
            blob_status_poll_interval: Duration::from_secs(1),
            rate_limit_backoff: Duration::from_secs(1),
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
        }
    }
}
