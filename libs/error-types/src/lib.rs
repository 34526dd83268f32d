//! Shared error vocabulary for the messaging workspace.
//!
//! Services define their own error enums but serialize failures through the
//! unified [`ErrorResponse`] body so clients can route on `code` and `error`
//! without knowing which handler produced the failure.

use serde::{Deserialize, Serialize};

/// Unified API error response body used by every HTTP handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type name, e.g. "NotFoundError"
    pub error: String,

    /// Human-readable message
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Stable machine-readable code, e.g. "NOT_FOUND"
    pub code: String,

    /// Request id when available (propagated from X-Request-ID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// RFC 3339 timestamp of the failure
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str, status: u16, code: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            status,
            code: code.to_string(),
            trace_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Stable error codes shared across services and clients.
pub mod error_codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const CONFLICT: &str = "CONFLICT";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_carries_code_and_type() {
        let resp = ErrorResponse::new("ForbiddenError", "forbidden", 403, error_codes::FORBIDDEN);
        assert_eq!(resp.status, 403);
        assert_eq!(resp.code, error_codes::FORBIDDEN);
        assert_eq!(resp.error, "ForbiddenError");
        assert!(resp.trace_id.is_none());
    }

    #[test]
    fn trace_id_is_attached_on_demand() {
        let resp = ErrorResponse::new("NotFoundError", "gone", 404, error_codes::NOT_FOUND)
            .with_trace_id("req-123");
        assert_eq!(resp.trace_id.as_deref(), Some("req-123"));
    }
}
