//! Response envelope shared by every REST endpoint.

use axum::http::StatusCode;
use serde::Serialize;

/// Standard JSON envelope.
///
/// ```json
/// { "success": true, "message": "instance created", "data": { ... }, "code": 200 }
/// { "success": false, "message": "invalid request", "error": "...", "code": 400 }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Short human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error detail on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// HTTP status code, repeated in the body.
    pub code: u16,
}

impl<T> ApiResponse<T> {
    /// Successful response with a payload.
    #[must_use]
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data: Some(data),
            code: StatusCode::OK.as_u16(),
        }
    }

    /// Failed response with an error detail.
    #[must_use]
    pub fn error(status: StatusCode, message: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: Some(message.into()),
            error: (!error.is_empty()).then_some(error),
            data: None,
            code: status.as_u16(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn success_shape() {
        let body = ApiResponse::success("ok", serde_json::json!({"a": 1}));
        let Ok(value) = serde_json::to_value(&body) else {
            panic!("serialization failed");
        };
        assert_eq!(
            value,
            serde_json::json!({"success": true, "message": "ok", "data": {"a": 1}, "code": 200})
        );
    }

    #[test]
    fn error_shape_omits_empty_detail() {
        let body = ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "denied", "");
        let Ok(value) = serde_json::to_value(&body) else {
            panic!("serialization failed");
        };
        assert_eq!(
            value,
            serde_json::json!({"success": false, "message": "denied", "code": 401})
        );
    }
}
