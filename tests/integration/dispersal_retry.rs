//! Dispersal retry classification seen through the storage manager.

use std::sync::Arc;
use std::time::Duration;

use quay_da::{DaError, DisperseError, MemDa, MemDaConfig, StatusCode};
use quay_integration_tests::{ScriptedDisperser, TestProxy, fast_v2_config, test_data};
use quay_manager::ManagerError;
use quay_types::BackendType;

fn scripted(errors: Vec<DisperseError>) -> (Arc<MemDa>, Arc<ScriptedDisperser>) {
    let da = Arc::new(MemDa::new(MemDaConfig::default()));
    let disperser = Arc::new(ScriptedDisperser::new(da.clone(), errors));
    (da, disperser)
}

#[tokio::test]
async fn test_transient_failures_are_absorbed() {
    let (da, disperser) = scripted(vec![
        DisperseError::Transport("connection reset".into()),
        DisperseError::status(StatusCode::Unavailable, "disperser restarting"),
    ]);
    let proxy = TestProxy::builder(BackendType::DaV2)
        .da(da)
        .v2_disperser(disperser.clone())
        .build();

    let payload = test_data(256, 3);
    let cert = proxy.manager.put(&payload).await.unwrap();
    assert_eq!(disperser.submissions(), 3);
    assert_eq!(proxy.manager.get(&cert).await.unwrap().as_ref(), payload.as_slice());

    proxy.shutdown().await;
}

#[tokio::test]
async fn test_invalid_argument_fails_without_retry() {
    let (da, disperser) = scripted(vec![DisperseError::status(
        StatusCode::InvalidArgument,
        "blob rejected",
    )]);
    let proxy = TestProxy::builder(BackendType::DaV2)
        .da(da)
        .v2_disperser(disperser.clone())
        .build();

    let err = proxy.manager.put(b"bad").await.unwrap_err();
    assert_eq!(disperser.submissions(), 1);
    let Some(primary) = err.primary() else {
        panic!("expected a store error, got {err:?}");
    };
    assert!(primary.is_caller_error());

    proxy.shutdown().await;
}

#[tokio::test]
async fn test_budget_exhaustion_reports_last_error() {
    let (da, disperser) = scripted(vec![
        DisperseError::Transport("first".into()),
        DisperseError::Transport("second".into()),
        DisperseError::Transport("third".into()),
        DisperseError::Transport("never reached".into()),
    ]);
    let proxy = TestProxy::builder(BackendType::DaV2)
        .da(da)
        .v2_disperser(disperser.clone())
        .build();

    let err = proxy.manager.put(b"unlucky").await.unwrap_err();
    assert_eq!(disperser.submissions(), 3);
    match err {
        ManagerError::Da(DaError::Dispersal { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(source, DisperseError::Transport(ref m) if m == "third"));
        }
        other => panic!("expected dispersal failure, got {other:?}"),
    }

    proxy.shutdown().await;
}

#[tokio::test]
async fn test_rate_limit_backs_off_before_retrying() {
    let (da, disperser) = scripted(vec![
        DisperseError::status(StatusCode::ResourceExhausted, "slow down"),
        DisperseError::status(StatusCode::ResourceExhausted, "slow down"),
    ]);
    let proxy = TestProxy::builder(BackendType::DaV2)
        .da(da)
        .v2_disperser(disperser.clone())
        .v2_config(quay_da::V2Config {
            rate_limit_backoff: Duration::from_millis(40),
            ..fast_v2_config()
        })
        .build();

    let started = tokio::time::Instant::now();
    proxy.manager.put(b"patient").await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(80));
    assert_eq!(disperser.submissions(), 3);

    proxy.shutdown().await;
}
