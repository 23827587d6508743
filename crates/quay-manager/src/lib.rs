//! Storage manager for quay.
//!
//! The [`StorageManager`] owns the generated-key stores and the
//! [`SecondaryManager`], and exposes the Put / Get / Verify pipeline:
//!
//! - **put**: disperse through the active store, then replicate the blob
//!   to every cache and fallback target in the background.
//! - **get**: route by certificate version; on failure, walk the fallback
//!   targets in priority order and serve the first verified copy.
//! - **verify**: check a certificate without downloading its blob.
//!
//! [`StorageManagerBuilder`] resolves configured target names at startup.

pub mod builder;
pub mod error;
pub mod manager;
pub mod secondary;

pub use builder::{SecondaryConfig, StorageManagerBuilder};
pub use error::{ConfigError, ManagerError, MissReason, TargetMiss, TargetRole};
pub use manager::{ManagerStatus, StorageManager};
pub use secondary::{SecondaryManager, SecondaryStats, WriteJob};
