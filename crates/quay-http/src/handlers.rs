//! API request handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, info};

use crate::AppState;
use crate::error::ApiError;

/// Decode a certificate from a path segment, with or without `0x`.
fn decode_cert(cert_hex: &str) -> Result<Vec<u8>, ApiError> {
    let digits = cert_hex.strip_prefix("0x").unwrap_or(cert_hex);
    Ok(hex::decode(digits)?)
}

fn octet_stream(bytes: bytes::Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
}

// -----------------------------------------------------------------------
// POST /put
// -----------------------------------------------------------------------

/// Disperse the request body and return the raw certificate bytes.
pub(crate) async fn put_blob(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let cert = state.manager.put(&body).await?;
    info!(size = body.len(), cert_len = cert.len(), "blob stored");
    Ok(octet_stream(cert))
}

// -----------------------------------------------------------------------
// GET /get/{cert_hex}
// -----------------------------------------------------------------------

/// Return the verified payload behind a hex-encoded certificate.
pub(crate) async fn get_blob(
    State(state): State<AppState>,
    Path(cert_hex): Path<String>,
) -> Result<Response, ApiError> {
    let cert = decode_cert(&cert_hex)?;
    let payload = state.manager.get(&cert).await?;
    debug!(size = payload.len(), "blob served");
    Ok(octet_stream(payload))
}

// -----------------------------------------------------------------------
// POST /verify/{cert_hex}
// -----------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct VerifyResponse {
    pub verified: bool,
    pub payload_checked: bool,
}

/// Verify a certificate. A non-empty body is also checked against it.
pub(crate) async fn verify_cert(
    State(state): State<AppState>,
    Path(cert_hex): Path<String>,
    body: Bytes,
) -> Result<Json<VerifyResponse>, ApiError> {
    let cert = decode_cert(&cert_hex)?;
    let payload = (!body.is_empty()).then_some(&body[..]);
    state.manager.verify(&cert, payload).await?;
    Ok(Json(VerifyResponse {
        verified: true,
        payload_checked: payload.is_some(),
    }))
}

// -----------------------------------------------------------------------
// GET /health
// -----------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub status: &'static str,
    pub active_backend: String,
    pub readable_versions: Vec<String>,
    pub cache_targets: Vec<String>,
    pub fallback_targets: Vec<String>,
    pub queued_writes: usize,
    pub dropped_writes: u64,
    pub failed_writes: u64,
}

/// Report wiring and replication counters.
pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.manager.status();
    Json(HealthResponse {
        status: "ok",
        active_backend: status.active.to_string(),
        readable_versions: status.readable.iter().map(ToString::to_string).collect(),
        cache_targets: status.caches.iter().map(ToString::to_string).collect(),
        fallback_targets: status.fallbacks.iter().map(ToString::to_string).collect(),
        queued_writes: status.secondary.queued,
        dropped_writes: status.secondary.dropped,
        failed_writes: status.secondary.writes_failed,
    })
}
