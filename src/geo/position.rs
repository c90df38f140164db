//! Position providers for geotagging captures.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AcquisitionError, Result};

/// Signed decimal-degree position (south and west are negative).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Source of the vehicle's current ground position
#[cfg_attr(test, mockall::automock)]
pub trait PositionProvider {
    /// Current latitude and longitude
    fn current_coordinates(&mut self) -> Result<Coordinates>;
}

/// Reads the latest position from a JSON file kept current by an orbit tracker.
///
/// The file holds a single object: `{"latitude": 51.2, "longitude": -0.4}`.
#[derive(Debug, Clone)]
pub struct PositionFeed {
    path: PathBuf,
}

impl PositionFeed {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PositionProvider for PositionFeed {
    fn current_coordinates(&mut self) -> Result<Coordinates> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            AcquisitionError::hardware(
                "position feed",
                format!("Failed to read {}: {}", self.path.display(), e),
            )
        })?;

        let coordinates: Coordinates = serde_json::from_str(&contents)?;
        debug!(
            "Position: lat {:.4}, lon {:.4}",
            coordinates.latitude, coordinates.longitude
        );
        Ok(coordinates)
    }
}

/// Constant position, for bench runs without a tracker.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinates);

impl PositionProvider for FixedPosition {
    fn current_coordinates(&mut self) -> Result<Coordinates> {
        Ok(self.0)
    }
}
