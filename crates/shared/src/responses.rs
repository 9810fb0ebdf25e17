//! Response envelope and error codes for the REST surface
//!
//! Every endpoint responds with `{ success, data?, error?, timestamp }`.
//! Error bodies carry a stable machine-readable code plus a human message
//! and an optional per-field details map.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error classification exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Missing or malformed request fields (HTTP 400)
    ValidationError,
    /// Referenced session/entity/mapping absent (HTTP 404)
    NotFound,
    /// State-machine transition from the wrong phase (HTTP 409)
    InvalidState,
    /// Persistence or other internal failure (HTTP 500)
    InternalError,
    /// Unknown code for forward compatibility
    #[serde(other)]
    Unknown,
}

/// Wire-format error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub code: ErrorCode,
    pub message: String,
    /// Per-field breakdown for validation failures
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

/// Standard response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiEnvelope<T> {
    pub fn success(data: T, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp,
        }
    }

    pub fn error(
        code: ErrorCode,
        message: impl Into<String>,
        details: BTreeMap<String, String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiErrorBody {
                code,
                message: message.into(),
                details,
            }),
            timestamp,
        }
    }
}

/// Convenience constructor for the common success case.
pub fn ok<T: Serialize>(data: T) -> ApiEnvelope<T> {
    ApiEnvelope::success(data, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_error() {
        let envelope = ok(serde_json::json!({"value": 1}));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn error_envelope_carries_code_and_details() {
        let mut details = BTreeMap::new();
        details.insert("entityCategory".to_string(), "unknown value".to_string());
        let envelope: ApiEnvelope<()> = ApiEnvelope::error(
            ErrorCode::ValidationError,
            "invalid mapping record",
            details,
            Utc::now(),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "validation_error");
        assert_eq!(json["error"]["details"]["entityCategory"], "unknown value");
    }

    #[test]
    fn unknown_error_codes_deserialize_gracefully() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"code":"rate_limited","message":"later"}"#).unwrap();
        assert_eq!(body.code, ErrorCode::Unknown);
    }
}
