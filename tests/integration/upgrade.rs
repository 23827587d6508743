//! Protocol upgrade: certificates issued before switching the active
//! backend remain readable afterwards.

use quay_integration_tests::{TestProxy, test_data};
use quay_manager::ManagerError;
use quay_types::{BackendType, CertVersion};

#[tokio::test]
async fn test_v1_certificates_readable_after_switch_to_v2() {
    let before = TestProxy::builder(BackendType::DaV1).build();
    let old_payload = test_data(3000, 1);
    let old_cert = before.manager.put(&old_payload).await.unwrap();
    assert_eq!(CertVersion::of(&old_cert).unwrap(), CertVersion::V1);
    let da = before.da.clone();
    before.shutdown().await;

    let after = TestProxy::builder(BackendType::DaV2).da(da).build();
    let new_payload = test_data(3000, 2);
    let new_cert = after.manager.put(&new_payload).await.unwrap();
    assert_eq!(CertVersion::of(&new_cert).unwrap(), CertVersion::V2);

    assert_eq!(after.manager.get(&old_cert).await.unwrap().as_ref(), old_payload.as_slice());
    assert_eq!(after.manager.get(&new_cert).await.unwrap().as_ref(), new_payload.as_slice());
    after.manager.verify(&old_cert, Some(&old_payload)).await.unwrap();

    after.shutdown().await;
}

#[tokio::test]
async fn test_retired_generation_is_reported() {
    let before = TestProxy::builder(BackendType::DaV1).build();
    let old_cert = before.manager.put(b"legacy").await.unwrap();
    let da = before.da.clone();
    before.shutdown().await;

    let after = TestProxy::builder(BackendType::DaV2)
        .da(da)
        .without_v1()
        .build();
    let err = after.manager.get(&old_cert).await.unwrap_err();
    assert!(matches!(err, ManagerError::NoStoreForVersion(CertVersion::V1)));

    after.shutdown().await;
}
