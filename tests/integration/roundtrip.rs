//! End-to-end Put/Get/Verify through the HTTP surface and the manager.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use quay_http::{ApiServer, ApiServerConfig};
use quay_integration_tests::{TestProxy, test_data};
use quay_types::{BackendType, CertVersion};
use tower::ServiceExt;

async fn call(app: &axum::Router, method: &str, uri: &str, body: Vec<u8>) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_http_roundtrip_for_both_generations() {
    for (active, version) in [
        (BackendType::DaV1, CertVersion::V1),
        (BackendType::DaV2, CertVersion::V2),
    ] {
        let proxy = TestProxy::builder(active).build();
        let app = ApiServer::new(ApiServerConfig {
            manager: proxy.manager.clone(),
            max_body_bytes: 1024 * 1024,
        })
        .into_router();

        let payload = test_data(10_000, 1);
        let (status, cert) = call(&app, "POST", "/put", payload.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(CertVersion::of(&cert).unwrap(), version);

        let cert_hex = hex::encode(&cert);
        let (status, body) = call(&app, "GET", &format!("/get/{cert_hex}"), Vec::new()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, payload);

        let (status, _) = call(&app, "POST", &format!("/verify/{cert_hex}"), payload).await;
        assert_eq!(status, StatusCode::OK);

        proxy.shutdown().await;
    }
}

#[tokio::test]
async fn test_many_sizes_roundtrip() {
    let proxy = TestProxy::builder(BackendType::DaV2).build();

    for (i, size) in [0usize, 1, 31, 32, 33, 4096, 100_000].into_iter().enumerate() {
        let payload = test_data(size, i as u32);
        let cert = proxy.manager.put(&payload).await.unwrap();
        let got = proxy.manager.get(&cert).await.unwrap();
        assert_eq!(got.as_ref(), payload.as_slice(), "size {size}");
    }

    proxy.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_puts_are_independent() {
    let proxy = TestProxy::builder(BackendType::DaV2).build();

    let mut handles = Vec::new();
    for i in 0..16u32 {
        let manager = proxy.manager.clone();
        handles.push(tokio::spawn(async move {
            let payload = test_data(2048, i);
            let cert = manager.put(&payload).await.unwrap();
            (payload, cert)
        }));
    }

    let mut certs = Vec::new();
    for h in handles {
        let (payload, cert) = h.await.unwrap();
        assert_eq!(proxy.manager.get(&cert).await.unwrap().as_ref(), payload.as_slice());
        certs.push(cert);
    }
    certs.sort();
    certs.dedup();
    assert_eq!(certs.len(), 16);

    proxy.shutdown().await;
}

#[tokio::test]
async fn test_certificate_verifies_on_another_manager() {
    let issuer = TestProxy::builder(BackendType::DaV2).build();
    let payload = test_data(512, 9);
    let cert = issuer.manager.put(&payload).await.unwrap();

    // A second proxy attached to the same network.
    let reader = TestProxy::builder(BackendType::DaV2)
        .da(issuer.da.clone())
        .build();
    reader.manager.verify(&cert, Some(&payload)).await.unwrap();
    assert_eq!(reader.manager.get(&cert).await.unwrap().as_ref(), payload.as_slice());

    issuer.shutdown().await;
    reader.shutdown().await;
}
