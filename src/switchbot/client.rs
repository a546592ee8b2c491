//! SwitchBot Cloud API Client
//!
//! Thin HTTP client for the one endpoint the exporter needs:
//! `GET {base_url}/v1.1/devices/{device_id}/status`.
//!
//! The client does not interpret the response. It hands back the HTTP status,
//! the rate-limit headers, and the raw body, so callers can record the quota
//! even when the request itself failed.
//!
//! # Example
//!
//! ```no_run
//! use switchbot_exporter::config::SwitchBotConfig;
//! use switchbot_exporter::switchbot::SwitchBotClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = SwitchBotClient::new(SwitchBotConfig::new("token", "secret"))?;
//! let response = client.get_device_status("588C81B65FDA").await?;
//! println!("{} remaining", response.rate_limit.remaining.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use crate::config::SwitchBotConfig;
use crate::error::Result;
use crate::switchbot::sign::sign;
use crate::switchbot::types::RateLimit;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::debug;

/// Raw device status response
///
/// `body` is a separate `Result` because the headers can arrive before the
/// body read fails.
#[derive(Debug)]
pub struct StatusResponse {
    pub status: StatusCode,
    pub rate_limit: RateLimit,
    pub body: Result<String>,
}

/// Client for the SwitchBot v1.1 API
///
/// Cheap to share across tasks: the underlying `reqwest::Client` pools
/// connections internally.
pub struct SwitchBotClient {
    http: Client,
    config: SwitchBotConfig,
}

impl SwitchBotClient {
    pub fn new(config: SwitchBotConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self { http, config })
    }

    /// URL of the status endpoint for one device
    pub fn status_url(&self, device_id: &str) -> String {
        format!(
            "{}/v1.1/devices/{}/status",
            self.config.base_url.trim_end_matches('/'),
            device_id
        )
    }

    /// Fetch the status of one device.
    ///
    /// Returns `Err` only when no response headers were received (connect
    /// failure, timeout). Any HTTP status, 2xx or not, is returned as a
    /// [`StatusResponse`].
    pub async fn get_device_status(&self, device_id: &str) -> Result<StatusResponse> {
        let token = self.config.token.expose_secret();
        let signature = sign(token, self.config.secret.expose_secret());
        let url = self.status_url(device_id);

        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, token)
            .header("sign", signature.sign)
            .header("nonce", signature.nonce)
            .header("t", signature.t)
            .header(CONTENT_TYPE, "application/json; charset=utf8")
            .send()
            .await?;

        let status = response.status();
        let rate_limit = RateLimit::from_headers(response.headers());
        let body = response.text().await.map_err(Into::into);

        Ok(StatusResponse {
            status,
            rate_limit,
            body,
        })
    }
}
