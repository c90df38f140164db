//! # Sense HAT over Linux IIO
//!
//! Reads the Sense HAT's LSM9DS1 accelerometer and magnetometer and the HTS221
//! humidity sensor's temperature channel through the kernel IIO sysfs
//! interface, plus the SoC temperature from a thermal zone.
//!
//! ## Units
//!
//! IIO reports `(raw + offset) * scale` in SI-derived units:
//!
//! - accelerometer: m/s², converted to g
//! - magnetometer: gauss, converted to microtesla
//! - temperature: millidegrees Celsius, converted to °C
//!
//! ## Orientation
//!
//! Pitch and roll come from the gravity vector. Yaw is the tilt-compensated
//! magnetometer heading, which is also reported as the compass heading.
//! All three are normalised to 0..360 degrees.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{AcquisitionError, Result};
use crate::sensors::{Orientation, SensorProvider, Vector3};

/// Standard gravity in m/s²
const STANDARD_GRAVITY: f64 = 9.80665;

/// Microtesla per gauss
const MICROTESLA_PER_GAUSS: f64 = 100.0;

const ACCEL_DEVICE_NAMES: &[&str] = &["lsm9ds1_accel", "lsm9ds1"];
const MAGN_DEVICE_NAMES: &[&str] = &["lsm9ds1_magn"];
const HUMIDITY_DEVICE_NAMES: &[&str] = &["hts221"];

/// One device directory under the IIO root
#[derive(Debug, Clone)]
struct IioDevice {
    path: PathBuf,
    name: String,
}

impl IioDevice {
    /// Finds the first device whose `name` attribute is in `names`.
    fn find(root: &Path, names: &[&str]) -> Result<Self> {
        let mut entries: Vec<_> = fs::read_dir(root)
            .map_err(|e| {
                AcquisitionError::hardware(
                    "sense hat",
                    format!("Failed to read {}: {}", root.display(), e),
                )
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();

        // Deterministic pick when a driver exposes several devices
        entries.sort();

        for path in entries {
            let name = match fs::read_to_string(path.join("name")) {
                Ok(name) => name.trim().to_string(),
                Err(_) => continue,
            };

            if names.contains(&name.as_str()) {
                debug!("Found IIO device {} at {}", name, path.display());
                return Ok(Self { path, name });
            }
        }

        Err(AcquisitionError::hardware(
            "sense hat",
            format!("No IIO device named {} under {}", names.join(" or "), root.display()),
        ))
    }

    fn attribute(&self, attribute: &str) -> Option<f64> {
        fs::read_to_string(self.path.join(attribute))
            .ok()
            .and_then(|value| value.trim().parse().ok())
    }

    /// Reads a channel such as `accel_x` or `temp` as `(raw + offset) * scale`.
    ///
    /// Scale and offset are looked up per channel first, then per channel type
    /// (`in_accel_scale`), defaulting to 1 and 0.
    fn channel(&self, channel: &str) -> Result<f64> {
        let raw = self.attribute(&format!("in_{}_raw", channel)).ok_or_else(|| {
            AcquisitionError::hardware(
                self.name.clone(),
                format!("Failed to read in_{}_raw", channel),
            )
        })?;

        let kind = channel.split('_').next().unwrap_or(channel);
        let lookup = |suffix: &str| {
            self.attribute(&format!("in_{}_{}", channel, suffix))
                .or_else(|| self.attribute(&format!("in_{}_{}", kind, suffix)))
        };

        let scale = lookup("scale").unwrap_or(1.0);
        let offset = lookup("offset").unwrap_or(0.0);

        Ok((raw + offset) * scale)
    }

    fn vector(&self, kind: &str) -> Result<Vector3> {
        Ok(Vector3::new(
            self.channel(&format!("{}_x", kind))?,
            self.channel(&format!("{}_y", kind))?,
            self.channel(&format!("{}_z", kind))?,
        ))
    }
}

fn normalize_degrees(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Pitch and roll from gravity, yaw from the tilt-compensated magnetometer.
///
/// # Examples
///
/// ```
/// use orbit_capture::sensors::Vector3;
/// use orbit_capture::sensors::iio::orientation_from;
///
/// // Level board, field pointing along +x
/// let o = orientation_from(Vector3::new(0.0, 0.0, 1.0), Vector3::new(20.0, 0.0, 0.0));
/// assert!(o.pitch.abs() < 1e-9 && o.roll.abs() < 1e-9 && o.yaw.abs() < 1e-9);
/// ```
#[must_use]
pub fn orientation_from(acceleration: Vector3, magnetic: Vector3) -> Orientation {
    let roll = acceleration.y.atan2(acceleration.z);
    let pitch = (-acceleration.x).atan2(
        (acceleration.y * acceleration.y + acceleration.z * acceleration.z).sqrt(),
    );

    let mx = magnetic.x * pitch.cos() + magnetic.z * pitch.sin();
    let my = magnetic.x * roll.sin() * pitch.sin() + magnetic.y * roll.cos()
        - magnetic.z * roll.sin() * pitch.cos();
    let yaw = (-my).atan2(mx);

    Orientation {
        pitch: normalize_degrees(pitch.to_degrees()),
        roll: normalize_degrees(roll.to_degrees()),
        yaw: normalize_degrees(yaw.to_degrees()),
    }
}

/// Sense HAT sensor board read through IIO sysfs
#[derive(Debug, Clone)]
pub struct IioSenseBoard {
    accel: IioDevice,
    magn: IioDevice,
    humidity: IioDevice,
    thermal_zone: PathBuf,
}

impl IioSenseBoard {
    /// Locates the Sense HAT devices under `iio_root`.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if any of the three devices is missing.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(iio_root: P, thermal_zone: Q) -> Result<Self> {
        let root = iio_root.as_ref();
        let board = Self {
            accel: IioDevice::find(root, ACCEL_DEVICE_NAMES)?,
            magn: IioDevice::find(root, MAGN_DEVICE_NAMES)?,
            humidity: IioDevice::find(root, HUMIDITY_DEVICE_NAMES)?,
            thermal_zone: thermal_zone.as_ref().to_path_buf(),
        };

        info!(
            "Sense HAT opened: {}, {}, {}",
            board.accel.path.display(),
            board.magn.path.display(),
            board.humidity.path.display()
        );
        Ok(board)
    }

    fn magnetic_gauss(&self) -> Result<Vector3> {
        self.magn.vector("magn")
    }

    fn acceleration_g(&self) -> Result<Vector3> {
        let v = self.accel.vector("accel")?;
        Ok(Vector3::new(
            v.x / STANDARD_GRAVITY,
            v.y / STANDARD_GRAVITY,
            v.z / STANDARD_GRAVITY,
        ))
    }
}

impl SensorProvider for IioSenseBoard {
    fn acceleration(&mut self) -> Result<Vector3> {
        self.acceleration_g()
    }

    fn compass_heading(&mut self) -> Result<f64> {
        Ok(self.orientation()?.yaw)
    }

    fn compass_raw(&mut self) -> Result<Vector3> {
        let v = self.magnetic_gauss()?;
        Ok(Vector3::new(
            v.x * MICROTESLA_PER_GAUSS,
            v.y * MICROTESLA_PER_GAUSS,
            v.z * MICROTESLA_PER_GAUSS,
        ))
    }

    fn orientation(&mut self) -> Result<Orientation> {
        Ok(orientation_from(self.acceleration_g()?, self.magnetic_gauss()?))
    }

    fn ambient_temperature(&mut self) -> Result<f64> {
        Ok(self.humidity.channel("temp")? / 1000.0)
    }

    fn cpu_temperature(&mut self) -> Result<f64> {
        let content = fs::read_to_string(&self.thermal_zone).map_err(|e| {
            AcquisitionError::hardware(
                "cpu thermometer",
                format!("Failed to read {}: {}", self.thermal_zone.display(), e),
            )
        })?;

        let millidegrees: i64 = content.trim().parse().map_err(|_| {
            AcquisitionError::hardware(
                "cpu thermometer",
                format!("Unexpected value {:?} in {}", content.trim(), self.thermal_zone.display()),
            )
        })?;

        Ok(millidegrees as f64 / 1000.0)
    }
}
