//! Server error types with HTTP status code mapping.
//!
//! [`ServerError`] is the central error type for failures that abort an
//! operation (configuration, persistence, serialization). Each variant maps
//! to a numeric code and an HTTP status.
//!
//! [`ProtocolError`] covers rejections of a single WebSocket frame. These
//! never close the connection: they are reported back to the client as an
//! `{"event":"error","reason":...}` reply.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "io error: permission denied",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code (see [`ServerError::error_code`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category      | HTTP Status               |
/// |-----------|---------------|---------------------------|
/// | 1000–1999 | Configuration | 500 Internal Server Error |
/// | 3000–3999 | Server        | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid or unparsable configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Filesystem failure while persisting session data.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Config(_) => 1001,
            Self::Internal(_) => 3000,
            Self::Io(_) => 3001,
            Self::Serialization(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Rejection of a single frame received on the trial route.
///
/// The [`Display`](std::fmt::Display) output is the `reason` string sent
/// back to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Text frame held valid JSON that was not an object.
    #[error("not_an_object")]
    NotAnObject,

    /// An `array_header` lacked required keys.
    #[error("missing:{}", .0.join(","))]
    MissingKeys(Vec<&'static str>),

    /// An `array_header` field had an unusable value.
    #[error("invalid_header:{0}")]
    InvalidHeader(&'static str),

    /// A binary frame arrived with no pending `array_header`.
    #[error("binary_without_header")]
    BinaryWithoutHeader,

    /// Binary payload length does not match the announced dtype and shape.
    #[error("reshape_failed")]
    ReshapeFailed {
        /// Byte length implied by the header.
        expected: Option<usize>,
        /// Byte length actually received.
        actual: usize,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_reason_lists_keys_in_order() {
        let err = ProtocolError::MissingKeys(vec!["name", "shape"]);
        assert_eq!(err.to_string(), "missing:name,shape");
    }

    #[test]
    fn reshape_reason_hides_lengths() {
        let err = ProtocolError::ReshapeFailed {
            expected: Some(8),
            actual: 3,
        };
        assert_eq!(err.to_string(), "reshape_failed");
    }

    #[test]
    fn io_error_maps_to_server_range() {
        let err = ServerError::from(std::io::Error::other("disk full"));
        assert_eq!(err.error_code(), 3001);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("disk full"));
    }
}
