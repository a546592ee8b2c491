//! SwitchBot Prometheus Exporter
//!
//! Polls the SwitchBot cloud API for the power draw of Plug Mini devices and
//! republishes the readings as Prometheus gauges.
//!
//! # Overview
//!
//! Every collection cycle issues one signed status request per configured
//! device, all concurrently. Each result is reconciled into the gauge set:
//! a reachable device has exactly one power series, an unreachable one has
//! none and is reported through `switchbot_device_up`. The API's remaining
//! quota is tracked from the response headers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    HTTPS (signed)    ┌──────────────┐
//! │  SwitchBot  │ ◄─────────────────►  │   Exporter   │
//! │  Cloud API  │  /v1.1/devices/…     │              │
//! └─────────────┘                      │  ┌────────┐  │      HTTP      ┌────────────┐
//!                                      │  │Collect.│  │ ◄────────────► │ Prometheus │
//!                                      │  └────────┘  │   /metrics     └────────────┘
//!                                      │  ┌────────┐  │
//!                                      │  │Metrics │  │
//!                                      │  └────────┘  │
//!                                      └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`switchbot`] - Request signing, HTTP client, and API types
//! - [`collector`] - Fetch outcomes and the per-cycle fan-out
//! - [`metrics`] - Gauge set and reconciliation rules
//! - [`devices`] - Device descriptors and `devices.json` loading
//! - [`server`] - HTTP server and collection loop
//! - [`probe`] - One-shot device inspection for the CLI
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use switchbot_exporter::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     server::start(config).await?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod devices;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod server;
pub mod switchbot;
