//! Prometheus Metrics Definitions
//!
//! This module owns the gauge set exposed by the exporter and the rules for
//! keeping it consistent with the latest poll of each device.
//!
//! # Metrics
//!
//! - `switchbot_power_watts{room,shelf,device,device_name,device_id,parent_id}` -
//!   Last power reading of a device that is currently up
//! - `switchbot_device_up{device_id}` - 1 if the last poll succeeded, 0 otherwise
//! - `switchbot_api_requests_remaining` - API calls left in the current quota window
//! - `switchbot_api_requests_limit` - Size of the quota window
//! - `switchbot_api_requests_reset_timestamp_seconds` - When the quota window resets
//!
//! # Consistency Rules
//!
//! - A device that is down has **no** power series. The series is removed, not
//!   zeroed, so "no data" is never confused with a plug drawing 0 W.
//! - A device that is up has exactly one power series. If its labels changed
//!   since the previous poll, the old series is removed first.
//! - `switchbot_device_up` is never removed once a device has been polled.
//! - The rate-limit gauges are absent until the API first reports them.
//!
//! Each registry is owned by its `MetricsCollector`, so tests can build
//! isolated instances.

use crate::collector::FetchOutcome;
use crate::devices::{DeviceDescriptor, POWER_LABELS};
use crate::switchbot::types::RateLimit;
use prometheus::core::Collector;
use prometheus::{Encoder, Gauge, GaugeVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, warn};

const NAMESPACE: &str = "switchbot";

/// Per-device bookkeeping of what is currently published
#[derive(Debug, Default)]
struct DeviceState {
    /// Label values of the live power series, if any
    power_labels: Option<Vec<String>>,
}

/// Metrics collector for SwitchBot devices
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    pub power_watts: Arc<GaugeVec>,
    pub device_up: Arc<IntGaugeVec>,

    // Rate limit, registered lazily on first observation
    pub api_requests_remaining: Arc<IntGauge>,
    pub api_requests_limit: Arc<IntGauge>,
    pub api_requests_reset_timestamp_seconds: Arc<Gauge>,
    remaining_registered: Arc<AtomicBool>,
    limit_registered: Arc<AtomicBool>,
    reset_registered: Arc<AtomicBool>,

    devices: Arc<Mutex<HashMap<String, DeviceState>>>,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Build the gauge set on an existing registry, which may already hold
    /// other collectors.
    pub fn with_registry(registry: Registry) -> anyhow::Result<Self> {

        let power_watts = GaugeVec::new(
            Opts::new("power_watts", "Current power usage in Watts").namespace(NAMESPACE),
            &POWER_LABELS,
        )?;

        let device_up = IntGaugeVec::new(
            Opts::new("device_up", "Device availability (1=OK, 0=NG)").namespace(NAMESPACE),
            &["device_id"],
        )?;

        let api_requests_remaining = IntGauge::with_opts(
            Opts::new(
                "api_requests_remaining",
                "Remaining API calls in the current quota window",
            )
            .namespace(NAMESPACE),
        )?;

        let api_requests_limit = IntGauge::with_opts(
            Opts::new(
                "api_requests_limit",
                "Total API calls allowed in the current quota window",
            )
            .namespace(NAMESPACE),
        )?;

        let api_requests_reset_timestamp_seconds = Gauge::with_opts(
            Opts::new(
                "api_requests_reset_timestamp_seconds",
                "Unix time at which the API quota window resets",
            )
            .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(power_watts.clone()))?;
        registry.register(Box::new(device_up.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            power_watts: Arc::new(power_watts),
            device_up: Arc::new(device_up),
            api_requests_remaining: Arc::new(api_requests_remaining),
            api_requests_limit: Arc::new(api_requests_limit),
            api_requests_reset_timestamp_seconds: Arc::new(api_requests_reset_timestamp_seconds),
            remaining_registered: Arc::new(AtomicBool::new(false)),
            limit_registered: Arc::new(AtomicBool::new(false)),
            reset_registered: Arc::new(AtomicBool::new(false)),
            devices: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn lock_devices(&self) -> MutexGuard<'_, HashMap<String, DeviceState>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the outcome of one device poll.
    ///
    /// The bookkeeping lock is held for the whole update, so concurrent
    /// renders and reconciles never observe a half-updated device.
    pub fn reconcile(&self, device: &DeviceDescriptor, outcome: &FetchOutcome) {
        let labels = device.labels();
        let mut devices = self.lock_devices();
        let state = devices.entry(device.id.clone()).or_default();

        match outcome {
            FetchOutcome::Success { watts } => {
                if let Some(previous) = &state.power_labels {
                    if !same_labels(previous, &labels) {
                        self.remove_power_series(previous);
                    }
                }
                self.power_watts.with_label_values(&labels).set(*watts);
                self.device_up.with_label_values(&[device.id.as_str()]).set(1);
                state.power_labels = Some(labels.iter().map(|v| v.to_string()).collect());
            }
            FetchOutcome::Failure { .. } => {
                self.device_up.with_label_values(&[device.id.as_str()]).set(0);
                if let Some(previous) = state.power_labels.take() {
                    self.remove_power_series(&previous);
                }
            }
        }
    }

    fn remove_power_series(&self, labels: &[String]) {
        let values: Vec<&str> = labels.iter().map(String::as_str).collect();
        // Absent series are fine: the device may never have reported power.
        let _ = self.power_watts.remove_label_values(&values);
    }

    /// Record the most recent quota headers. Absent values leave the
    /// corresponding gauge untouched.
    pub fn observe_rate_limit(&self, rate_limit: &RateLimit, low_water: i64) {
        if let Some(remaining) = rate_limit.remaining {
            self.register_once(&self.remaining_registered, &*self.api_requests_remaining);
            self.api_requests_remaining.set(remaining);
            if remaining < low_water {
                warn!(
                    "SwitchBot API quota is running low: {} calls remaining",
                    remaining
                );
            }
        }
        if let Some(limit) = rate_limit.limit {
            self.register_once(&self.limit_registered, &*self.api_requests_limit);
            self.api_requests_limit.set(limit);
        }
        if let Some(reset_ms) = rate_limit.reset_ms {
            self.register_once(
                &self.reset_registered,
                &*self.api_requests_reset_timestamp_seconds,
            );
            self.api_requests_reset_timestamp_seconds
                .set(reset_ms as f64 / 1000.0);
        }
    }

    fn register_once<C>(&self, flag: &AtomicBool, collector: &C)
    where
        C: Collector + Clone + 'static,
    {
        if !flag.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.registry.register(Box::new(collector.clone())) {
                error!("Failed to register rate limit metric: {}", e);
                // Not exposed, so not observed; the next response retries.
                flag.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Live power reading of a device, `None` when no series is published
    pub fn power_reading(&self, device: &DeviceDescriptor) -> Option<f64> {
        let devices = self.lock_devices();
        let published = devices.get(&device.id)?.power_labels.as_ref()?;
        let values: Vec<&str> = published.iter().map(String::as_str).collect();
        self.power_watts
            .get_metric_with_label_values(&values)
            .ok()
            .map(|gauge| gauge.get())
    }

    /// Label values of the live power series of a device
    pub fn power_labels(&self, device_id: &str) -> Option<Vec<String>> {
        self.lock_devices().get(device_id)?.power_labels.clone()
    }

    /// Availability of a device, `None` until it has been polled once
    pub fn up_status(&self, device_id: &str) -> Option<i64> {
        let devices = self.lock_devices();
        devices.get(device_id)?;
        Some(self.device_up.with_label_values(&[device_id]).get())
    }

    /// Last observed quota remaining, `None` until first observed
    pub fn rate_remaining(&self) -> Option<i64> {
        if self.remaining_registered.load(Ordering::SeqCst) {
            Some(self.api_requests_remaining.get())
        } else {
            None
        }
    }

    /// True when at least one device is currently up
    pub fn any_device_up(&self) -> bool {
        self.lock_devices()
            .values()
            .any(|state| state.power_labels.is_some())
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = {
            // Hold the device lock so no reconcile is half-applied in the output.
            let _devices = self.lock_devices();
            self.registry.gather()
        };
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn same_labels(previous: &[String], current: &[&str]) -> bool {
    previous.len() == current.len() && previous.iter().zip(current).all(|(a, b)| a == b)
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics collector")
    }
}
