use crate::error::ExporterError;
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub switchbot: SwitchBotConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SwitchBotConfig {
    #[serde(default = "empty_secret")]
    pub token: SecretString,
    #[serde(default = "empty_secret")]
    pub secret: SecretString,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_collection_interval")]
    pub collection_interval_seconds: u64,
    #[serde(default = "default_device_config_path")]
    pub device_config_path: String,
    #[serde(default = "default_rate_limit_low_water")]
    pub rate_limit_low_water: i64,
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

pub fn default_base_url() -> String {
    "https://api.switch-bot.com".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_collection_interval() -> u64 {
    60
}

fn default_device_config_path() -> String {
    "devices.json".to_string()
}

fn default_rate_limit_low_water() -> i64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            collection_interval_seconds: default_collection_interval(),
            device_config_path: default_device_config_path(),
            rate_limit_low_water: default_rate_limit_low_water(),
        }
    }
}

impl Default for SwitchBotConfig {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

impl SwitchBotConfig {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            secret: SecretString::from(secret.into()),
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SWITCHBOT_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Reject configurations the collection loop cannot run with.
    ///
    /// Missing credentials are fatal at startup rather than surfacing later as
    /// a cycle full of authentication failures.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.switchbot.token.expose_secret().trim().is_empty() {
            return Err(ExporterError::Config(
                "Missing SwitchBot token (set SWITCHBOT_TOKEN)".to_string(),
            ));
        }
        if self.switchbot.secret.expose_secret().trim().is_empty() {
            return Err(ExporterError::Config(
                "Missing SwitchBot secret (set SWITCHBOT_SECRET)".to_string(),
            ));
        }
        if self.metrics.collection_interval_seconds == 0 {
            return Err(ExporterError::Config(
                "collection_interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.switchbot.request_timeout_seconds == 0 {
            return Err(ExporterError::Config(
                "request_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
