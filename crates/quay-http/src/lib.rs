//! HTTP API for quay.
//!
//! Provides an [`ApiServer`] exposing the storage manager over axum:
//!
//! - `POST /put`: disperse the body, respond with the raw certificate
//! - `GET /get/{cert_hex}`: respond with the verified payload
//! - `POST /verify/{cert_hex}`: verify a certificate; a non-empty body is
//!   also checked against it
//! - `GET /health`: wiring and replication counters
//!
//! Errors are JSON bodies `{"code": ..., "message": ...}`.

mod error;
mod handlers;


use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use quay_manager::StorageManager;

pub use error::ApiError;

/// Shared application state for all handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    /// The storage manager.
    pub manager: Arc<StorageManager>,
}

/// Configuration for creating an [`ApiServer`].
pub struct ApiServerConfig {
    /// The storage manager to serve.
    pub manager: Arc<StorageManager>,
    /// Largest request body accepted.
    pub max_body_bytes: usize,
}

/// HTTP server backed by a [`StorageManager`].
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ApiServerConfig) -> Self {
        let state = AppState {
            manager: config.manager,
        };
        let router = Self::build_router(state, config.max_body_bytes);
        Self { router }
    }

    fn build_router(state: AppState, max_body_bytes: usize) -> Router {
        Router::new()
            .route("/put", post(handlers::put_blob))
            .route("/get/{cert_hex}", get(handlers::get_blob))
            .route("/verify/{cert_hex}", post(handlers::verify_cert))
            .route("/health", get(handlers::health))
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .with_state(state)
    }

    /// Return the inner [`Router`] (useful for testing with `tower::ServiceExt`).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve the API on `addr` until `shutdown` completes, then finish
    /// in-flight requests.
    pub async fn serve_with_shutdown(
        self,
        addr: &str,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr, "api server listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
