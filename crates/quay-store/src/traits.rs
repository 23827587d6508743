//! Core trait for precomputed-key stores.

use bytes::Bytes;
use quay_types::{BackendType, BlobKey};

use crate::error::StoreError;

/// A plain key/value store where the caller chooses the key.
///
/// Secondary targets are addressed by [`BlobKey`], the hash of the
/// certificate a blob was issued under. There are no certificate semantics
/// at this layer: a store returns whatever bytes were last put.
///
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait::async_trait]
pub trait PrecomputedKeyStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: BlobKey, value: Bytes) -> Result<(), StoreError>;

    /// Retrieve the value for `key`. Returns `None` if not present.
    async fn get(&self, key: BlobKey) -> Result<Option<Bytes>, StoreError>;

    /// Which kind of backend this is.
    fn backend_type(&self) -> BackendType;
}
