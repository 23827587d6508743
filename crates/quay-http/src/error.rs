//! API error type and its JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quay_da::{ClientError, DaError};
use quay_manager::ManagerError;
use serde::Serialize;
use tracing::error;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The certificate path segment is not hex.
    #[error("certificate is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// An error from the storage manager.
    #[error(transparent)]
    Manager(#[from] ManagerError),
}

/// Body of every error response.
#[derive(Serialize)]
pub(crate) struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    /// Map to an HTTP status code and a stable error code.
    fn classify(&self) -> (StatusCode, &'static str) {
        let manager = match self {
            Self::InvalidHex(_) => return (StatusCode::BAD_REQUEST, "InvalidCertificate"),
            Self::Manager(e) => e,
        };

        let Some(primary) = manager.primary() else {
            // A certificate generation this proxy does not serve.
            return (StatusCode::BAD_REQUEST, "UnsupportedCertificate");
        };

        match primary {
            DaError::Decode(_) => (StatusCode::BAD_REQUEST, "InvalidCertificate"),
            DaError::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge"),
            e if e.is_caller_error() => (StatusCode::BAD_REQUEST, "InvalidPayload"),
            DaError::Dispersal { .. } => (StatusCode::SERVICE_UNAVAILABLE, "DispersalFailed"),
            DaError::Verification(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VerificationFailed"),
            DaError::Retrieval(ClientError::NotFound) => (StatusCode::NOT_FOUND, "NotFound"),
            DaError::Retrieval(ClientError::Transport(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Unavailable")
            }
            DaError::Retrieval(_) | DaError::Envelope(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }
        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
