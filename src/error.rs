//! # Error Types
//!
//! Custom error types for Orbit Capture using `thiserror`.
//!
//! Every error is unrecoverable for the acquisition loop. The loop logs it once
//! as `<category>: <message>` and stops, so [`AcquisitionError::category`] is
//! part of the event log format.

use thiserror::Error;

/// Main error type for Orbit Capture
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Sensor board, camera or position source failure
    #[error("{component}: {message}")]
    Hardware { component: String, message: String },

    /// Output directory enumeration, write or delete failure
    #[error("{context}: {message}")]
    Storage { context: String, message: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record file errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Captured image could not be decoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Position feed could not be parsed
    #[error("Position feed error: {0}")]
    Position(#[from] serde_json::Error),

    /// Non-finite angle handed to the geo converter
    #[error("Invalid angle: {0}")]
    InvalidAngle(f64),
}

impl AcquisitionError {
    pub fn hardware<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Hardware {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn storage<C: Into<String>, M: Into<String>>(context: C, message: M) -> Self {
        Self::Storage {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Fault category written in front of the message in the event log
    ///
    /// # Examples
    ///
    /// ```
    /// use orbit_capture::error::AcquisitionError;
    ///
    /// let err = AcquisitionError::hardware("camera", "device busy");
    /// assert_eq!(err.category(), "HardwareFault");
    /// ```
    pub fn category(&self) -> &'static str {
        match self {
            Self::Hardware { .. } | Self::Position(_) | Self::InvalidAngle(_) => "HardwareFault",
            Self::Storage { .. } | Self::Io(_) | Self::Csv(_) | Self::Image(_) => "StorageFault",
            Self::Config(_) => "ConfigFault",
        }
    }
}

/// Result type alias for Orbit Capture
pub type Result<T> = std::result::Result<T, AcquisitionError>;
