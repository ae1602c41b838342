//! Error types for the hub and the HTTP surface.
//!
//! [`HubError`] covers the few ways a hub call can fail as a whole.
//! [`GatewayError`] is what REST handlers return; each variant maps to an
//! HTTP status and renders as the standard [`ApiResponse`] envelope.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::api::dto::ApiResponse;

/// Failure of a hub operation as a whole.
///
/// Problems with a single connection (full queue, dead transport) are never
/// reported here; they end in eviction or in a per-connection entry of
/// [`crate::domain::ChannelReport`].
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The payload could not be serialized; nothing was enqueued.
    #[error("failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The dispatch loop has stopped.
    #[error("hub is not running")]
    Closed,
}

/// Server-side error enum with HTTP status code mapping.
///
/// | Variant               | HTTP Status                 |
/// |-----------------------|-----------------------------|
/// | `InvalidRequest`      | 400 Bad Request             |
/// | `Upstream`            | upstream status (or 502)    |
/// | `UpstreamUnavailable` | 502 Bad Gateway             |
/// | `Hub`, `Internal`     | 500 Internal Server Error   |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The instance API answered with an unexpected status.
    #[error("instance API returned {status}")]
    Upstream {
        /// Status code returned by the instance API.
        status: u16,
        /// Raw response body, passed through for diagnosis.
        body: String,
    },

    /// The instance API could not be reached or timed out.
    #[error("failed to reach instance API: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),

    /// The hub rejected a broadcast.
    #[error("broadcast failed: {0}")]
    Hub(#[from] HubError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Hub(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the detail string placed in the envelope's `error` field.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Upstream { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let message = match &self {
            Self::InvalidRequest(_) => "invalid request",
            Self::Upstream { .. } => "instance API error",
            Self::UpstreamUnavailable(_) => "failed to communicate with instance API",
            Self::Hub(_) | Self::Internal(_) => "internal error",
        };
        let body = ApiResponse::<()>::error(status, message, self.detail());
        (status, axum::Json(body)).into_response()
    }
}
