//! A [`PrecomputedKeyStore`] wrapper that injects latency and failures.
//!
//! `FlakyStore` wraps any `Arc<dyn PrecomputedKeyStore>`, sleeps for a
//! seeded random duration before each operation and can be switched into a
//! failing mode at runtime. It also counts calls, which lets tests assert
//! the order and number of reads a fallback walk performs.
//!
//! # Example
//!
//! ```ignore
//! let flaky = FlakyStore::new(inner)
//!     .get_latency(5, 20)
//!     .put_latency(10, 30)
//!     .seed(42);
//! flaky.fail_puts(true);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use quay_types::{BackendType, BlobKey};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::StoreError;
use crate::traits::PrecomputedKeyStore;

/// Test and chaos wrapper around another secondary store.
pub struct FlakyStore {
    inner: Arc<dyn PrecomputedKeyStore>,
    get_latency_ms: (u64, u64),
    put_latency_ms: (u64, u64),
    rng: Mutex<StdRng>,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl FlakyStore {
    /// Wrap an existing store as a healthy, zero-latency pass-through.
    pub fn new(inner: Arc<dyn PrecomputedKeyStore>) -> Self {
        Self {
            inner,
            get_latency_ms: (0, 0),
            put_latency_ms: (0, 0),
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            fail_gets: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        }
    }

    /// Set the read latency range in milliseconds (uniform random).
    pub fn get_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.get_latency_ms = (min_ms, max_ms);
        self
    }

    /// Set the write latency range in milliseconds (uniform random).
    pub fn put_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.put_latency_ms = (min_ms, max_ms);
        self
    }

    /// Set the RNG seed for deterministic latency.
    pub fn seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Make every subsequent read fail with [`StoreError::Unavailable`].
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with [`StoreError::Unavailable`].
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Number of reads attempted, including failed ones.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of writes attempted, including failed ones.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    async fn delay(&self, range: (u64, u64)) {
        let (min, max) = range;
        if max == 0 {
            return;
        }

        let ms = if min >= max {
            max
        } else {
            self.rng.lock().expect("lock poisoned").random_range(min..=max)
        };

        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait::async_trait]
impl PrecomputedKeyStore for FlakyStore {
    async fn put(&self, key: BlobKey, value: Bytes) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.delay(self.put_latency_ms).await;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "{} rejected write",
                self.inner.backend_type()
            )));
        }
        self.inner.put(key, value).await
    }

    async fn get(&self, key: BlobKey) -> Result<Option<Bytes>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.delay(self.get_latency_ms).await;
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "{} rejected read",
                self.inner.backend_type()
            )));
        }
        self.inner.get(key).await
    }

    fn backend_type(&self) -> BackendType {
        self.inner.backend_type()
    }
}
