//! Write-behind replication under load and faults.

use quay_integration_tests::{TargetBacking, TestProxy, test_data};
use quay_manager::SecondaryConfig;
use quay_store::PrecomputedKeyStore;
use quay_types::{BackendTarget, BackendType, BlobKey};

#[tokio::test]
async fn test_concurrent_puts_replicate_everything() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = TestProxy::builder(BackendType::DaV2)
        .target(BackendTarget::Memory, TargetBacking::Memory)
        .target(BackendTarget::File, TargetBacking::Dir(dir.path()))
        .secondary(SecondaryConfig {
            cache_targets: vec!["memory".into()],
            fallback_targets: vec!["file".into()],
            async_put_workers: 4,
            queue_capacity: 256,
        })
        .build();

    let mut handles = Vec::new();
    for i in 0..32u32 {
        let manager = proxy.manager.clone();
        handles.push(tokio::spawn(async move {
            let payload = test_data(512, i);
            (manager.put(&payload).await.unwrap(), payload)
        }));
    }
    let mut written = Vec::new();
    for h in handles {
        written.push(h.await.unwrap());
    }

    assert!(proxy.wait_for_writes(64).await);
    let stats = proxy.manager.secondary().stats();
    assert_eq!(stats.writes_ok, 64);
    assert_eq!(stats.dropped, 0);

    for (cert, payload) in &written {
        let key = BlobKey::from_data(cert);
        for target in [BackendTarget::Memory, BackendTarget::File] {
            let got = proxy.target(target).get(key).await.unwrap();
            assert_eq!(got.as_deref(), Some(payload.as_slice()));
        }
    }

    proxy.shutdown().await;
}

#[tokio::test]
async fn test_failing_cache_never_fails_puts() {
    let proxy = TestProxy::builder(BackendType::DaV1)
        .target(BackendTarget::Memory, TargetBacking::Memory)
        .secondary(SecondaryConfig {
            cache_targets: vec!["memory".into()],
            fallback_targets: Vec::new(),
            async_put_workers: 2,
            queue_capacity: 64,
        })
        .build();
    proxy.target(BackendTarget::Memory).fail_puts(true);

    for i in 0..8u32 {
        let payload = test_data(128, i);
        let cert = proxy.manager.put(&payload).await.unwrap();
        assert_eq!(proxy.manager.get(&cert).await.unwrap().as_ref(), payload.as_slice());
    }

    assert!(proxy.wait_for_writes(8).await);
    assert_eq!(proxy.manager.secondary().stats().writes_failed, 8);

    proxy.shutdown().await;
}
