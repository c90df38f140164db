//! # Image Quality Filter
//!
//! Discards frames that are predominantly black, e.g. when the vehicle's
//! attitude points the camera at empty space.
//!
//! The score of an image is the sum of its mean red, green and blue values
//! (each 0-255). Images scoring below the threshold are discarded; a score
//! equal to the threshold is kept.
//!
//! ```
//! use image::{Rgb, RgbImage};
//! use orbit_capture::imaging::quality::{QualityFilter, Verdict};
//!
//! let filter = QualityFilter::default();
//! let night = RgbImage::from_pixel(8, 8, Rgb([2, 3, 4]));
//! assert_eq!(filter.evaluate(&night), Verdict::Discard);
//! ```

use image::RgbImage;
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// Default minimum summed channel mean to keep an image
pub const DEFAULT_BRIGHTNESS_THRESHOLD: f64 = 60.0;

/// Outcome of evaluating one captured image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Discard,
}

/// Mean intensity per channel over every pixel of an image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelMeans {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl ChannelMeans {
    /// Full scan of the image. An image without pixels has all means at 0.
    #[must_use]
    pub fn of(image: &RgbImage) -> Self {
        let pixel_count = u64::from(image.width()) * u64::from(image.height());
        if pixel_count == 0 {
            return Self::default();
        }

        let (mut red, mut green, mut blue) = (0u64, 0u64, 0u64);
        for pixel in image.pixels() {
            red += u64::from(pixel[0]);
            green += u64::from(pixel[1]);
            blue += u64::from(pixel[2]);
        }

        let count = pixel_count as f64;
        Self {
            red: red as f64 / count,
            green: green as f64 / count,
            blue: blue as f64 / count,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.red + self.green + self.blue
    }
}

/// Brightness check applied to every capture.
#[derive(Debug, Clone, Copy)]
pub struct QualityFilter {
    threshold: f64,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BRIGHTNESS_THRESHOLD)
    }
}

impl QualityFilter {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[must_use]
    pub fn evaluate(&self, image: &RgbImage) -> Verdict {
        let score = ChannelMeans::of(image).total();
        if score < self.threshold {
            Verdict::Discard
        } else {
            Verdict::Keep
        }
    }

    /// Decodes the image at `path` and evaluates it.
    ///
    /// # Errors
    ///
    /// Returns `Image` if the file cannot be opened or decoded.
    pub fn evaluate_file(&self, path: &Path) -> Result<Verdict> {
        let image = image::open(path)?.to_rgb8();
        let verdict = self.evaluate(&image);
        debug!("{} evaluated as {:?}", path.display(), verdict);
        Ok(verdict)
    }
}
