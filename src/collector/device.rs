//! Device Power Collector
//!
//! Polls one Plug Mini and turns the response into a [`FetchOutcome`].
//!
//! # Metrics Produced
//! - `switchbot_power_watts` - Labels: room, shelf, device, device_name, device_id, parent_id
//! - `switchbot_device_up` - Labels: device_id
//! - `switchbot_api_requests_*` - from the rate-limit headers of every response

use super::{CollectionContext, CollectionStatus};
use crate::devices::DeviceDescriptor;
use crate::switchbot::types::{StatusEnvelope, HEADER_RATE_REMAINING, STATUS_SUCCESS};
use crate::switchbot::StatusResponse;
use std::fmt;
use tracing::{debug, warn};

/// Result of polling one device once
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The device answered; `watts` is its present power draw
    Success { watts: f64 },
    /// The device is considered down until the next cycle
    Failure { reason: FailureReason },
}

/// Why a poll did not produce a reading
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Non-2xx HTTP status, with the vendor `message` when the body had one
    HttpStatus { status: u16, message: String },
    /// HTTP 2xx but the vendor status code was not 100
    Vendor { code: i64, message: String },
    /// Connect failure, timeout, or broken body
    Transport(String),
    /// Body was not a valid status envelope, or the reading was negative
    MalformedBody(String),
    /// The collection task itself panicked
    TaskPanicked,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::HttpStatus { status, message } if message.is_empty() => {
                write!(f, "HTTP status {}", status)
            }
            FailureReason::HttpStatus { status, message } => {
                write!(f, "HTTP status {}: {}", status, message)
            }
            FailureReason::Vendor { code, message } => {
                write!(f, "SwitchBot status {}: {}", code, message)
            }
            FailureReason::Transport(e) => write!(f, "transport error: {}", e),
            FailureReason::MalformedBody(e) => write!(f, "malformed response: {}", e),
            FailureReason::TaskPanicked => write!(f, "collection task panicked"),
        }
    }
}

impl FetchOutcome {
    pub fn failure(reason: FailureReason) -> Self {
        FetchOutcome::Failure { reason }
    }

    /// Classify a status response.
    ///
    /// Checked in order: HTTP status, body read, JSON shape, vendor status
    /// code. A successful response without a `weight` field is a 0 W reading,
    /// not a failure. A negative `weight` is rejected as malformed.
    pub fn from_response(response: StatusResponse) -> Self {
        if !response.status.is_success() {
            let message = response
                .body
                .as_deref()
                .map(error_message)
                .unwrap_or_default();
            return Self::failure(FailureReason::HttpStatus {
                status: response.status.as_u16(),
                message,
            });
        }

        let body = match response.body {
            Ok(body) => body,
            Err(e) => return Self::failure(FailureReason::Transport(e.to_string())),
        };

        let envelope: StatusEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) => return Self::failure(FailureReason::MalformedBody(e.to_string())),
        };

        if envelope.status_code != STATUS_SUCCESS {
            return Self::failure(FailureReason::Vendor {
                code: envelope.status_code,
                message: envelope.message.unwrap_or_default(),
            });
        }

        let watts = envelope
            .body
            .and_then(|body| body.weight)
            .unwrap_or(0.0);

        if watts < 0.0 {
            return Self::failure(FailureReason::MalformedBody(format!(
                "negative power reading {}",
                watts
            )));
        }

        FetchOutcome::Success { watts }
    }
}

/// `message` of an error body, or empty when the body is not JSON or has none
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["message"].as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Poll one device and record the quota headers of the response.
pub async fn fetch_device(ctx: &CollectionContext, device: &DeviceDescriptor) -> FetchOutcome {
    match ctx.client.get_device_status(&device.id).await {
        Ok(response) => {
            if response.rate_limit.remaining.is_none() {
                warn!(
                    "Response for device {} has no {} header",
                    device.id, HEADER_RATE_REMAINING
                );
            }
            ctx.metrics
                .observe_rate_limit(&response.rate_limit, ctx.rate_limit_low_water);
            FetchOutcome::from_response(response)
        }
        Err(e) => FetchOutcome::failure(FailureReason::Transport(e.to_string())),
    }
}

/// Poll one device and update its gauges.
pub async fn collect_device(ctx: &CollectionContext, device: &DeviceDescriptor) -> CollectionStatus {
    let outcome = fetch_device(ctx, device).await;
    ctx.metrics.reconcile(device, &outcome);

    match outcome {
        FetchOutcome::Success { watts } => {
            debug!("Device {} ({}) reports {} W", device.name, device.id, watts);
            CollectionStatus::Success
        }
        FetchOutcome::Failure { reason } => {
            warn!("Device {} ({}) is down: {}", device.name, device.id, reason);
            CollectionStatus::Failed
        }
    }
}
