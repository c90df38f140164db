//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all, through
//! [`Config::default`]) yields the flight configuration: 3060 MB storage
//! ceiling, brightness threshold 60 and a 178 minute time budget.

use chrono::Duration;
use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AcquisitionError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub mission: MissionConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub position: PositionConfig,
}

/// Output directory layout and size ceiling
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_size_ceiling_mb")]
    pub size_ceiling_mb: f64,

    #[serde(default = "default_data_file")]
    pub data_file: String,

    #[serde(default = "default_event_log")]
    pub event_log: String,

    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
}

/// Camera configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_preview")]
    pub preview: bool,

    #[serde(default = "default_brightness_threshold")]
    pub brightness_threshold: f64,

    #[serde(default = "default_camera_command")]
    pub command: String,
}

/// Mission timing
#[derive(Debug, Deserialize, Clone)]
pub struct MissionConfig {
    #[serde(default = "default_time_budget_minutes")]
    pub time_budget_minutes: u64,
}

/// Sensor board sysfs locations
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_iio_root")]
    pub iio_root: PathBuf,

    #[serde(default = "default_thermal_zone")]
    pub thermal_zone: PathBuf,
}

/// Position source
#[derive(Debug, Deserialize, Clone)]
pub struct PositionConfig {
    #[serde(default = "default_feed_path")]
    pub feed_path: PathBuf,
}

// Default value functions
fn default_output_dir() -> PathBuf { PathBuf::from("./output") }
fn default_size_ceiling_mb() -> f64 { 3060.0 }
fn default_data_file() -> String { "data.csv".to_string() }
fn default_event_log() -> String { "events.log".to_string() }
fn default_image_prefix() -> String { "img_".to_string() }

fn default_width() -> u32 { 1296 }
fn default_height() -> u32 { 972 }
fn default_preview() -> bool { true }
fn default_brightness_threshold() -> f64 { 60.0 }
fn default_camera_command() -> String { "rpicam-still".to_string() }

fn default_time_budget_minutes() -> u64 { 178 }

fn default_iio_root() -> PathBuf { PathBuf::from("/sys/bus/iio/devices") }
fn default_thermal_zone() -> PathBuf { PathBuf::from("/sys/class/thermal/thermal_zone0/temp") }

fn default_feed_path() -> PathBuf { PathBuf::from("/run/orbit/position.json") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            size_ceiling_mb: default_size_ceiling_mb(),
            data_file: default_data_file(),
            event_log: default_event_log(),
            image_prefix: default_image_prefix(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            preview: default_preview(),
            brightness_threshold: default_brightness_threshold(),
            command: default_camera_command(),
        }
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            time_budget_minutes: default_time_budget_minutes(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            iio_root: default_iio_root(),
            thermal_zone: default_thermal_zone(),
        }
    }
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            feed_path: default_feed_path(),
        }
    }
}

impl StorageConfig {
    /// Path of the sensor record file
    pub fn data_path(&self) -> PathBuf {
        self.output_dir.join(&self.data_file)
    }

    /// Path of the image captured for `counter`
    pub fn image_path(&self, counter: u64) -> PathBuf {
        self.output_dir
            .join(format!("{}{}.jpg", self.image_prefix, counter))
    }
}

impl MissionConfig {
    pub fn time_budget(&self) -> Duration {
        Duration::minutes(self.time_budget_minutes as i64)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
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
    /// use orbit_capture::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.storage.output_dir.as_os_str().is_empty() {
            return Err(invalid("output_dir cannot be empty"));
        }

        for (name, value) in [
            ("data_file", &self.storage.data_file),
            ("event_log", &self.storage.event_log),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(invalid(format!("{} must be a plain file name", name)));
            }
        }

        if self.storage.data_file == self.storage.event_log {
            return Err(invalid("data_file and event_log must differ"));
        }

        if self.storage.image_prefix.contains('/') {
            return Err(invalid("image_prefix cannot contain '/'"));
        }

        if !self.storage.size_ceiling_mb.is_finite() || self.storage.size_ceiling_mb <= 0.0 {
            return Err(invalid("size_ceiling_mb must be greater than 0"));
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(invalid("camera width and height must be greater than 0"));
        }

        // Sum of three channel means on a 0-255 scale
        if !(0.0..=765.0).contains(&self.camera.brightness_threshold) {
            return Err(invalid("brightness_threshold must be between 0 and 765"));
        }

        if self.camera.command.is_empty() {
            return Err(invalid("camera command cannot be empty"));
        }

        if self.mission.time_budget_minutes > 24 * 60 {
            return Err(invalid("time_budget_minutes must be at most 1440"));
        }

        Ok(())
    }
}

fn invalid<M: std::fmt::Display>(message: M) -> AcquisitionError {
    AcquisitionError::Config(toml::de::Error::custom(message))
}
