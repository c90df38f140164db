//! # Geo Converter
//!
//! Converts signed decimal-degree angles into the rational triples used by
//! image positional metadata.
//!
//! ## Encoding
//!
//! An angle is split into sign, whole degrees, minutes and seconds:
//!
//! - degrees = trunc(|angle|)
//! - minutes = trunc(fractional degrees × 60)
//! - seconds = fractional minutes × 60
//!
//! Degrees and minutes are written as `n/1`. Seconds are scaled by 10 and
//! written as `n/10`, which keeps one decimal digit without a floating-point
//! metadata field.
//!
//! ```
//! use orbit_capture::geo::converter::{convert, GeoAngle};
//!
//! let angle = GeoAngle::from_degrees(-51.4769)?;
//! let converted = convert(&angle);
//! assert!(converted.is_negative);
//! assert_eq!(converted.exif_value(), "51/1,28/1,368/10");
//! # Ok::<(), orbit_capture::error::AcquisitionError>(())
//! ```

use crate::error::{AcquisitionError, Result};
use crate::geo::position::Coordinates;

/// Denominator of the seconds field
pub const SECONDS_DENOMINATOR: i64 = 10;

/// A finite signed angle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoAngle {
    degrees: f64,
}

/// Sexagesimal decomposition of a [`GeoAngle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dms {
    pub negative: bool,
    pub degrees: f64,
    pub minutes: f64,
    pub seconds: f64,
}

impl GeoAngle {
    /// Creates an angle from decimal degrees.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAngle` for NaN or infinite input.
    pub fn from_degrees(degrees: f64) -> Result<Self> {
        if !degrees.is_finite() {
            return Err(AcquisitionError::InvalidAngle(degrees));
        }
        Ok(Self { degrees })
    }

    #[must_use]
    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    /// Splits the angle into sign, degrees, minutes and seconds.
    #[must_use]
    pub fn dms(&self) -> Dms {
        let abs = self.degrees.abs();
        let degrees = abs.trunc();
        let fractional_minutes = (abs - degrees) * 60.0;
        let minutes = fractional_minutes.trunc();
        let seconds = (fractional_minutes - minutes) * 60.0;

        Dms {
            negative: self.degrees < 0.0,
            degrees,
            minutes,
            seconds,
        }
    }
}

/// Angle encoded as three `numerator/denominator` rationals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedAngle {
    pub is_negative: bool,
    pub encoded: [String; 3],
}

impl ConvertedAngle {
    /// Comma-joined triple, e.g. `"51/1,28/1,368/10"`.
    #[must_use]
    pub fn exif_value(&self) -> String {
        self.encoded.join(",")
    }
}

/// Converts an angle into its sign flag and rational triple.
#[must_use]
pub fn convert(angle: &GeoAngle) -> ConvertedAngle {
    let dms = angle.dms();

    ConvertedAngle {
        is_negative: dms.negative,
        encoded: [
            format!("{}/1", dms.degrees.round() as i64),
            format!("{}/1", dms.minutes.round() as i64),
            format!(
                "{}/{}",
                (dms.seconds * SECONDS_DENOMINATOR as f64).round() as i64,
                SECONDS_DENOMINATOR
            ),
        ],
    }
}

/// Latitude and longitude ready to be attached to the next capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoTag {
    pub latitude: ConvertedAngle,
    pub longitude: ConvertedAngle,
}

impl GeoTag {
    /// Converts both coordinates.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAngle` if either coordinate is not finite.
    pub fn from_coordinates(coordinates: Coordinates) -> Result<Self> {
        let latitude = GeoAngle::from_degrees(coordinates.latitude)?;
        let longitude = GeoAngle::from_degrees(coordinates.longitude)?;

        Ok(Self {
            latitude: convert(&latitude),
            longitude: convert(&longitude),
        })
    }

    /// Metadata key/value pairs in the order they are handed to the camera.
    #[must_use]
    pub fn metadata(&self) -> [(&'static str, String); 4] {
        let latitude_ref = if self.latitude.is_negative { "S" } else { "N" };
        let longitude_ref = if self.longitude.is_negative { "W" } else { "E" };

        [
            ("GPS.GPSLatitude", self.latitude.exif_value()),
            ("GPS.GPSLatitudeRef", latitude_ref.to_string()),
            ("GPS.GPSLongitude", self.longitude.exif_value()),
            ("GPS.GPSLongitudeRef", longitude_ref.to_string()),
        ]
    }
}
