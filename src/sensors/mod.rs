//! # Sensors Module
//!
//! Environmental and inertial readings taken once per iteration.
//!
//! This module handles:
//! - The sensor provider trait consumed by the acquisition loop
//! - Reading a full snapshot of every value a record needs
//! - A Linux IIO implementation for the Sense HAT (see [`iio`])

pub mod iio;

use crate::error::Result;

/// Three-axis reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Rounds every axis to `decimals` places.
    #[must_use]
    pub fn rounded(&self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        Self {
            x: (self.x * factor).round() / factor,
            y: (self.y * factor).round() / factor,
            z: (self.z * factor).round() / factor,
        }
    }
}

/// Attitude in degrees, each axis in 0..360
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

/// Sensor board consumed by the acquisition loop
#[cfg_attr(test, mockall::automock)]
pub trait SensorProvider {
    /// Acceleration in g
    fn acceleration(&mut self) -> Result<Vector3>;

    /// Compass heading in degrees from magnetic north
    fn compass_heading(&mut self) -> Result<f64>;

    /// Raw magnetometer vector in microtesla
    fn compass_raw(&mut self) -> Result<Vector3>;

    /// Pitch, roll and yaw in degrees
    fn orientation(&mut self) -> Result<Orientation>;

    /// Ambient temperature in °C
    fn ambient_temperature(&mut self) -> Result<f64>;

    /// CPU temperature in °C
    fn cpu_temperature(&mut self) -> Result<f64>;
}

/// Every reading that goes into one record
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSnapshot {
    pub acceleration: Vector3,
    pub compass_heading: f64,
    pub compass_raw: Vector3,
    pub orientation: Orientation,
    pub ambient_temperature: f64,
    pub cpu_temperature: f64,
}

impl SensorSnapshot {
    /// Reads all values from `provider`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error.
    pub fn read(provider: &mut dyn SensorProvider) -> Result<Self> {
        Ok(Self {
            acceleration: provider.acceleration()?,
            compass_heading: provider.compass_heading()?,
            compass_raw: provider.compass_raw()?,
            orientation: provider.orientation()?,
            ambient_temperature: provider.ambient_temperature()?,
            cpu_temperature: provider.cpu_temperature()?,
        })
    }
}
