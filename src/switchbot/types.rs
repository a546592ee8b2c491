//! SwitchBot API Type Definitions
//!
//! Response shapes for `GET /v1.1/devices/{id}/status` and the rate-limit
//! headers attached to every response.
//!
//! ```json
//! { "statusCode": 100, "body": { "weight": 22.6, "voltage": 101.2 }, "message": "success" }
//! ```

use reqwest::header::HeaderMap;
use serde::Deserialize;

/// Vendor status code meaning the call succeeded
pub const STATUS_SUCCESS: i64 = 100;

pub const HEADER_RATE_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_RATE_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RATE_RESET: &str = "x-ratelimit-reset";

/// Outer JSON envelope of every API response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEnvelope {
    pub status_code: i64,
    #[serde(default)]
    pub body: Option<DeviceStatusBody>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Device status body of a Plug Mini.
///
/// The present power draw in watts is reported in the field named `weight`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusBody {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// Quota information advertised by the `x-ratelimit-*` headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
    /// Epoch milliseconds at which the quota window resets
    pub reset_ms: Option<i64>,
}

impl RateLimit {
    /// Read the rate-limit headers. Absent or unparsable headers become `None`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };

        Self {
            limit: read(HEADER_RATE_LIMIT),
            remaining: read(HEADER_RATE_REMAINING),
            reset_ms: read(HEADER_RATE_RESET),
        }
    }
}
