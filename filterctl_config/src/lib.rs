//! Typed TOML startup configuration.
//!
//! The file only seeds the controller's initial settings; the JSON
//! `configure` command remains the runtime configuration surface. Every
//! section and field is optional.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Control {
    /// 0 = MANUAL, 1 = CONTINUOUS, 2 = SINGLESHOT
    pub mode: Option<u8>,
    /// Liveness timeout in seconds
    pub timeout: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Positions {
    #[serde(rename = "in")]
    pub in_counts: Option<[i32; 4]>,
    #[serde(rename = "out")]
    pub out_counts: Option<[i32; 4]>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PixelCountThresholds {
    pub low1: Option<u64>,
    pub low2: Option<u64>,
    pub high1: Option<u64>,
    pub high2: Option<u64>,
    pub high3: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub control: Control,
    pub positions: Positions,
    pub thresholds: PixelCountThresholds,
    pub logging: Logging,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(mode) = self.control.mode {
            if mode > 2 {
                return Err(ConfigError::Invalid("control.mode must be 0, 1 or 2"));
            }
        }
        if let Some(timeout) = self.control.timeout {
            if !timeout.is_finite() || timeout < 0.0 {
                return Err(ConfigError::Invalid(
                    "control.timeout must be a non-negative number of seconds",
                ));
            }
        }
        if let Some(rotation) = self.logging.rotation.as_deref() {
            if !matches!(rotation, "never" | "daily" | "hourly") {
                return Err(ConfigError::Invalid(
                    "logging.rotation must be never, daily or hourly",
                ));
            }
        }
        Ok(())
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}
