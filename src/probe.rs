//! One-shot device inspection
//!
//! Fetches the status of a few devices once and prints everything the API
//! returned: HTTP status, quota headers, vendor status, and the body fields.
//! Useful when writing `devices.json` or chasing a device that stays down.

use crate::collector::FetchOutcome;
use crate::config::SwitchBotConfig;
use crate::devices;
use crate::switchbot::types::RateLimit;
use crate::switchbot::{StatusResponse, SwitchBotClient};
use anyhow::{Context, Result};
use chrono::DateTime;
use std::fmt::Write as _;

/// Probe the given devices, or every device in `device_config_path` when
/// `device_ids` is empty.
pub async fn run(
    config: SwitchBotConfig,
    device_config_path: &str,
    device_ids: Vec<String>,
) -> Result<()> {
    let device_ids = if device_ids.is_empty() {
        let devices = devices::read_devices(device_config_path)
            .context("No device ids given and the device file could not be read")?;
        devices.into_iter().map(|d| d.id).collect()
    } else {
        device_ids
    };

    let client = SwitchBotClient::new(config)?;

    for device_id in &device_ids {
        match client.get_device_status(device_id).await {
            Ok(response) => print!("{}", format_report(device_id, response)),
            Err(e) => println!("{}\n  [ERROR] {}\n", section(device_id), e),
        }
    }

    Ok(())
}

fn section(device_id: &str) -> String {
    format!("─── Device: {} ───", device_id)
}

/// Human-readable report of one status response
pub fn format_report(device_id: &str, response: StatusResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", section(device_id));
    let _ = writeln!(out, "  HTTP Status           : {}", response.status);
    out.push_str(&format_rate_limit(&response.rate_limit));

    match &response.body {
        Ok(body) => match serde_json::from_str::<serde_json::Value>(body) {
            Ok(json) => {
                let _ = writeln!(out, "  statusCode            : {}", json["statusCode"]);
                let _ = writeln!(out, "  message               : {}", json["message"]);
                match json["body"].as_object() {
                    Some(fields) if !fields.is_empty() => {
                        let _ = writeln!(out, "  body:");
                        for (key, value) in fields {
                            let marker = if key == "weight" { "  <- power (W)" } else { "" };
                            let _ = writeln!(out, "    {:<24}: {}{}", key, value, marker);
                        }
                    }
                    _ => {
                        let _ = writeln!(out, "  body                  : (empty)");
                    }
                }
            }
            Err(_) => {
                let _ = writeln!(out, "  raw body              : {}", body);
            }
        },
        Err(e) => {
            let _ = writeln!(out, "  body                  : (unreadable: {})", e);
        }
    }

    let outcome = match FetchOutcome::from_response(response) {
        FetchOutcome::Success { watts } => format!("up, {} W", watts),
        FetchOutcome::Failure { reason } => format!("down, {}", reason),
    };
    let _ = writeln!(out, "  exporter would report : {}\n", outcome);
    out
}

fn format_rate_limit(rate_limit: &RateLimit) -> String {
    let show = |value: Option<i64>| match value {
        Some(v) => v.to_string(),
        None => "(missing)".to_string(),
    };

    let reset = match rate_limit.reset_ms {
        Some(ms) => match DateTime::from_timestamp_millis(ms) {
            Some(at) => format!("{}  ({})", ms, at.to_rfc3339()),
            None => ms.to_string(),
        },
        None => "(missing)".to_string(),
    };

    format!(
        "  x-ratelimit-limit     : {}\n  x-ratelimit-remaining : {}\n  x-ratelimit-reset     : {}\n",
        show(rate_limit.limit),
        show(rate_limit.remaining),
        reset
    )
}
