//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and key is optional; an empty file yields the defaults.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::controller::calibration::CalibrationSchedule;
use crate::controller::joycon::ControllerSettings;
use crate::error::{JoyconError, Result};
use crate::protocol::state::{ControllerIdentity, Side};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub device: DeviceIds,
    pub polling: PollingConfig,
    pub lifecycle: LifecycleConfig,
    pub calibration: CalibrationConfig,
    pub logging: LoggingConfig,
    pub demo: DemoConfig,
}

/// HID identifiers
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DeviceIds {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,

    #[serde(default = "default_product_id_left")]
    pub product_id_left: u16,

    #[serde(default = "default_product_id_right")]
    pub product_id_right: u16,
}

/// Polling loop configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Connect/disconnect timing
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

/// Calibration configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CalibrationConfig {
    #[serde(default = "default_calibration_steps")]
    pub steps: u32,

    #[serde(default = "default_calibration_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_feedback_every")]
    pub feedback_every: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write daily rolling log files here instead of stdout
    #[serde(default)]
    pub directory: Option<String>,
}

/// Demo binary loop
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    #[serde(default = "default_demo_iterations")]
    pub iterations: u64,

    #[serde(default = "default_demo_interval_ms")]
    pub interval_ms: u64,
}

// Default value functions
fn default_vendor_id() -> u16 { 1406 }
fn default_product_id_left() -> u16 { 8198 }
fn default_product_id_right() -> u16 { 8199 }

fn default_read_timeout_ms() -> u64 { 20 }

fn default_settle_ms() -> u64 { 20 }
fn default_grace_ms() -> u64 { 20 }
fn default_join_timeout_ms() -> u64 { 500 }

fn default_calibration_steps() -> u32 { 30 }
fn default_calibration_interval_ms() -> u64 { 100 }
fn default_feedback_every() -> u32 { 5 }

fn default_log_level() -> String { "info".to_string() }

fn default_demo_iterations() -> u64 { 100 }
fn default_demo_interval_ms() -> u64 { 100 }

impl Default for DeviceIds {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id_left: default_product_id_left(),
            product_id_right: default_product_id_right(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            grace_ms: default_grace_ms(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            steps: default_calibration_steps(),
            interval_ms: default_calibration_interval_ms(),
            feedback_every: default_feedback_every(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            iterations: default_demo_iterations(),
            interval_ms: default_demo_interval_ms(),
        }
    }
}

impl DeviceIds {
    /// Side for a product id, `None` if it is not a Joy-Con
    pub fn side_of(&self, product_id: u16) -> Option<Side> {
        if product_id == self.product_id_left {
            Some(Side::Left)
        } else if product_id == self.product_id_right {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn identity(&self, side: Side) -> ControllerIdentity {
        let product_id = match side {
            Side::Left => self.product_id_left,
            Side::Right => self.product_id_right,
        };
        ControllerIdentity::new(side, self.vendor_id, product_id)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joycon_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.device.product_id_left == self.device.product_id_right {
            return Err(invalid("product_id_left and product_id_right must differ"));
        }

        if self.polling.read_timeout_ms == 0 || self.polling.read_timeout_ms > 1000 {
            return Err(invalid("read_timeout_ms must be between 1 and 1000"));
        }

        if self.lifecycle.settle_ms > 10000 {
            return Err(invalid("settle_ms must be at most 10000"));
        }

        if self.lifecycle.grace_ms > 10000 {
            return Err(invalid("grace_ms must be at most 10000"));
        }

        // Disconnect must outwait at least one polling read
        if self.lifecycle.join_timeout_ms < self.polling.read_timeout_ms {
            return Err(invalid("join_timeout_ms must be at least read_timeout_ms"));
        }

        if self.calibration.steps == 0 {
            return Err(invalid("calibration steps must be greater than 0"));
        }

        if self.calibration.feedback_every == 0 {
            return Err(invalid("feedback_every must be greater than 0"));
        }

        if self.calibration.interval_ms > 10000 {
            return Err(invalid("calibration interval_ms must be at most 10000"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging level must be one of: trace, debug, info, warn, error",
            ));
        }

        if matches!(&self.logging.directory, Some(dir) if dir.is_empty()) {
            return Err(invalid("logging directory cannot be empty when set"));
        }

        if self.demo.interval_ms == 0 {
            return Err(invalid("demo interval_ms must be greater than 0"));
        }

        Ok(())
    }

    pub fn calibration_schedule(&self) -> CalibrationSchedule {
        CalibrationSchedule::new(
            self.calibration.steps,
            Duration::from_millis(self.calibration.interval_ms),
            self.calibration.feedback_every,
        )
    }

    /// Session timing for [`Joycon`](crate::controller::joycon::Joycon)
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            read_timeout: Duration::from_millis(self.polling.read_timeout_ms),
            settle: Duration::from_millis(self.lifecycle.settle_ms),
            grace: Duration::from_millis(self.lifecycle.grace_ms),
            join_timeout: Duration::from_millis(self.lifecycle.join_timeout_ms),
            calibration: self.calibration_schedule(),
        }
    }
}

fn invalid(message: &str) -> JoyconError {
    JoyconError::Config(toml::de::Error::custom(message))
}
