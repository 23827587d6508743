//! Precomputed-key storage trait and secondary backend implementations.
//!
//! This crate defines the [`PrecomputedKeyStore`] trait used for cache and
//! fallback targets, along with its backends:
//!
//! - [`MemoryStore`]: in-memory cache backed by a `RwLock<HashMap>`.
//! - [`FileStore`]: object storage on disk with a 2-level fan-out layout.
//! - [`FlakyStore`]: wrapper that injects latency and failures.

mod error;
mod file_store;
mod flaky_store;
mod memory_store;
mod traits;

pub use error::StoreError;
pub use file_store::FileStore;
pub use flaky_store::FlakyStore;
pub use memory_store::MemoryStore;
pub use traits::PrecomputedKeyStore;
