//! Secondary reads after the DA network loses blobs or goes offline.

use quay_integration_tests::{TargetBacking, TestProxy, test_data};
use quay_manager::{ManagerError, MissReason, SecondaryConfig, TargetRole};
use quay_store::PrecomputedKeyStore;
use quay_types::{BackendTarget, BackendType, BlobKey};

fn targets(caches: &[&str], fallbacks: &[&str], workers: usize) -> SecondaryConfig {
    SecondaryConfig {
        cache_targets: caches.iter().map(|s| s.to_string()).collect(),
        fallback_targets: fallbacks.iter().map(|s| s.to_string()).collect(),
        async_put_workers: workers,
        queue_capacity: 64,
    }
}

#[tokio::test]
async fn test_secondaries_serve_after_blobs_pruned() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = TestProxy::builder(BackendType::DaV2)
        .target(BackendTarget::Memory, TargetBacking::Memory)
        .target(BackendTarget::File, TargetBacking::Dir(dir.path()))
        .secondary(targets(&["memory"], &["file"], 2))
        .build();

    let mut written = Vec::new();
    for i in 0..10u32 {
        let payload = test_data(1000 + i as usize, i);
        let cert = proxy.manager.put(&payload).await.unwrap();
        written.push((cert, payload));
    }
    // Two targets per job.
    assert!(proxy.wait_for_writes(20).await);

    proxy.da.forget_blobs();
    for (cert, payload) in &written {
        let got = proxy.manager.get(cert).await.unwrap();
        assert_eq!(got.as_ref(), payload.as_slice());
    }
    assert_eq!(proxy.target(BackendTarget::Memory).get_count(), 10);
    assert_eq!(proxy.target(BackendTarget::File).get_count(), 0);

    // With the cache unreadable the file fallback takes over.
    proxy.target(BackendTarget::Memory).fail_gets(true);
    for (cert, payload) in &written {
        let got = proxy.manager.get(cert).await.unwrap();
        assert_eq!(got.as_ref(), payload.as_slice());
    }
    assert_eq!(proxy.target(BackendTarget::File).get_count(), 10);

    proxy.shutdown().await;
}

#[tokio::test]
async fn test_cache_only_target_serves_after_blobs_pruned() {
    let proxy = TestProxy::builder(BackendType::DaV1)
        .target(BackendTarget::Memory, TargetBacking::Memory)
        .secondary(targets(&["memory"], &[], 0))
        .build();

    let payload = test_data(2048, 5);
    let cert = proxy.manager.put(&payload).await.unwrap();
    proxy.da.forget_blobs();

    let got = proxy.manager.get(&cert).await.unwrap();
    assert_eq!(got.as_ref(), payload.as_slice());
    assert_eq!(proxy.target(BackendTarget::Memory).get_count(), 1);

    proxy.shutdown().await;
}

#[tokio::test]
async fn test_fallback_serves_while_network_offline() {
    for active in [BackendType::DaV1, BackendType::DaV2] {
        let proxy = TestProxy::builder(active)
            .target(BackendTarget::Memory, TargetBacking::Memory)
            .secondary(targets(&[], &["memory"], 0))
            .build();

        let payload = test_data(3000, 11);
        let cert = proxy.manager.put(&payload).await.unwrap();
        proxy.da.set_online(false);

        let got = proxy.manager.get(&cert).await.unwrap();
        assert_eq!(got.as_ref(), payload.as_slice());
        assert_eq!(proxy.target(BackendTarget::Memory).get_count(), 1);

        // Copies still need the chain to vouch for them.
        proxy.da.set_chain_online(false);
        let err = proxy.manager.get(&cert).await.unwrap_err();
        assert!(matches!(err.misses()[0].reason, MissReason::Unverified(_)));

        proxy.shutdown().await;
    }
}

#[tokio::test]
async fn test_file_fallback_survives_proxy_restart() {
    let dir = tempfile::tempdir().unwrap();
    let first = TestProxy::builder(BackendType::DaV2)
        .target(BackendTarget::File, TargetBacking::Dir(dir.path()))
        .secondary(targets(&[], &["file"], 0))
        .build();

    let payload = test_data(4096, 77);
    let cert = first.manager.put(&payload).await.unwrap();
    let da = first.da.clone();
    first.shutdown().await;

    da.forget_blobs();
    let second = TestProxy::builder(BackendType::DaV2)
        .da(da)
        .target(BackendTarget::File, TargetBacking::Dir(dir.path()))
        .secondary(targets(&[], &["file"], 0))
        .build();

    let got = second.manager.get(&cert).await.unwrap();
    assert_eq!(got.as_ref(), payload.as_slice());
    second.shutdown().await;
}

#[tokio::test]
async fn test_fallback_order_and_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = TestProxy::builder(BackendType::DaV2)
        .target(BackendTarget::Memory, TargetBacking::Memory)
        .target(BackendTarget::File, TargetBacking::Dir(dir.path()))
        .secondary(targets(&[], &["file", "memory"], 0))
        .build();

    let cert = proxy.manager.put(b"both copies").await.unwrap();
    proxy.da.forget_blobs();

    // First target fails outright: the walk moves on to the second.
    proxy.target(BackendTarget::File).fail_gets(true);
    assert_eq!(proxy.manager.get(&cert).await.unwrap().as_ref(), b"both copies");

    // Both fail: the primary error wins and each miss is reported in order.
    proxy.target(BackendTarget::Memory).fail_gets(true);
    let err = proxy.manager.get(&cert).await.unwrap_err();
    let ManagerError::ReadFailed { primary, misses } = &err else {
        panic!("expected ReadFailed, got {err:?}");
    };
    assert!(!primary.is_decode());
    assert_eq!(misses.len(), 2);
    assert_eq!(misses[0].target, BackendType::File);
    assert_eq!(misses[1].target, BackendType::Memory);
    assert!(misses.iter().all(|m| m.role == TargetRole::Fallback));
    assert!(misses.iter().all(|m| matches!(m.reason, MissReason::Unavailable(_))));

    proxy.shutdown().await;
}

#[tokio::test]
async fn test_tampered_fallback_copy_is_not_served() {
    let proxy = TestProxy::builder(BackendType::DaV2)
        .target(BackendTarget::Memory, TargetBacking::Memory)
        .secondary(targets(&[], &["memory"], 0))
        .build();

    let cert = proxy.manager.put(b"original").await.unwrap();
    proxy
        .target(BackendTarget::Memory)
        .put(BlobKey::from_data(&cert), bytes::Bytes::from_static(b"forged"))
        .await
        .unwrap();
    proxy.da.forget_blobs();

    let err = proxy.manager.get(&cert).await.unwrap_err();
    assert!(matches!(
        err.misses()[0].reason,
        MissReason::Unverified(_)
    ));

    proxy.shutdown().await;
}
