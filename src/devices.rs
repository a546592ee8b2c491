//! Device Descriptors
//!
//! Static description of every monitored plug and the attributes that become
//! Prometheus labels. Descriptors are read once at startup from a JSON array
//! (the `devices.json` format) and are never mutated afterwards.
//!
//! ```json
//! [
//!   { "id": "588C81B65FDA", "name": "nas", "room": "work", "shelf": "rack_1",
//!     "device": "server", "parent_id": "none" }
//! ]
//! ```
//!
//! Missing attributes fall back to `"unknown"`, except `parent_id` which falls
//! back to `"none"` so un-nested plugs group together.

use crate::error::{ExporterError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Label value used when a plug is not nested under a power strip.
pub const NO_PARENT: &str = "none";

const UNKNOWN: &str = "unknown";

/// Label names of `switchbot_power_watts`, in the order [`DeviceDescriptor::labels`] returns values.
pub const POWER_LABELS: [&str; 6] = [
    "room",
    "shelf",
    "device",
    "device_name",
    "device_id",
    "parent_id",
];

/// One monitored device and its grouping attributes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceDescriptor {
    /// Vendor device identifier
    pub id: String,
    #[serde(default = "unknown")]
    pub name: String,
    #[serde(default = "unknown")]
    pub room: String,
    #[serde(default = "unknown")]
    pub shelf: String,
    /// Device class (what is plugged in), exported as the `device` label
    #[serde(default = "unknown", rename = "device")]
    pub device_class: String,
    #[serde(default = "no_parent")]
    pub parent_id: String,
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

fn no_parent() -> String {
    NO_PARENT.to_string()
}

impl DeviceDescriptor {
    /// Descriptor with every attribute at its default
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: unknown(),
            room: unknown(),
            shelf: unknown(),
            device_class: unknown(),
            parent_id: no_parent(),
        }
    }

    /// Label values for `switchbot_power_watts`, ordered as [`POWER_LABELS`]
    pub fn labels(&self) -> [&str; 6] {
        [
            self.room.as_str(),
            self.shelf.as_str(),
            self.device_class.as_str(),
            self.name.as_str(),
            self.id.as_str(),
            self.parent_id.as_str(),
        ]
    }
}

/// Parse a `devices.json` document.
///
/// Entries without an id are dropped, and only the first entry of a repeated
/// id is kept.
pub fn parse_devices(json: &str) -> Result<Vec<DeviceDescriptor>> {
    let entries: Vec<DeviceDescriptor> = serde_json::from_str(json)?;
    let mut seen = HashSet::new();
    let mut devices = Vec::with_capacity(entries.len());

    for entry in entries {
        if entry.id.trim().is_empty() {
            warn!("Skipping device entry without id: {:?}", entry);
            continue;
        }
        if !seen.insert(entry.id.clone()) {
            warn!("Duplicate device id '{}', keeping the first entry", entry.id);
            continue;
        }
        devices.push(entry);
    }

    Ok(devices)
}

/// Read and parse a device file without any fallback
pub fn read_devices(path: impl AsRef<Path>) -> Result<Vec<DeviceDescriptor>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        ExporterError::Config(format!(
            "Failed to read device file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_devices(&json)
}

/// Load the device list, falling back to [`sample_devices`] when the file is
/// missing or cannot be parsed.
pub fn load_devices(path: impl AsRef<Path>) -> Vec<DeviceDescriptor> {
    let path = path.as_ref();
    match read_devices(path) {
        Ok(devices) => {
            info!("Loaded {} device(s) from {}", devices.len(), path.display());
            devices
        }
        Err(e) => {
            warn!("{}; using built-in sample device list", e);
            sample_devices()
        }
    }
}

/// Built-in device list used when no device file is available
pub fn sample_devices() -> Vec<DeviceDescriptor> {
    vec![
        DeviceDescriptor {
            id: "588C81B65FDA".to_string(),
            name: "power_strip".to_string(),
            room: "work".to_string(),
            shelf: "rack_1".to_string(),
            device_class: "power_strip".to_string(),
            parent_id: no_parent(),
        },
        DeviceDescriptor {
            id: "9888E0C67E5E".to_string(),
            name: "nas".to_string(),
            room: "work".to_string(),
            shelf: "rack_1".to_string(),
            device_class: "server".to_string(),
            parent_id: "588C81B65FDA".to_string(),
        },
    ]
}
