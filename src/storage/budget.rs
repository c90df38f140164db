//! # Storage Budget
//!
//! Measures the output directory and compares it against a ceiling.
//!
//! Usage is recomputed by walking the whole directory on every call rather
//! than tracked incrementally, so the figure always reflects what is on disk.
//! Bytes are converted to megabytes as `bytes / 1_000_000`, rounded half-up
//! to two decimals.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AcquisitionError, Result};

/// Bytes in one hundredth of a megabyte
const BYTES_PER_CENTI_MB: u64 = 10_000;

/// Source of the total byte size of the output directory
#[cfg_attr(test, mockall::automock)]
pub trait UsageSource {
    fn total_bytes(&self) -> Result<u64>;
}

/// Sums the sizes of every regular file below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
}

impl DirectoryWalker {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn directory_bytes(path: &Path) -> Result<u64> {
        let entries = fs::read_dir(path).map_err(|e| scan_error(path, e))?;

        let mut total = 0u64;
        for entry in entries {
            let entry = entry.map_err(|e| scan_error(path, e))?;
            let file_type = entry.file_type().map_err(|e| scan_error(&entry.path(), e))?;

            if file_type.is_dir() {
                total += Self::directory_bytes(&entry.path())?;
            } else if file_type.is_file() {
                let metadata = entry.metadata().map_err(|e| scan_error(&entry.path(), e))?;
                total += metadata.len();
            }
        }

        Ok(total)
    }
}

fn scan_error(path: &Path, e: std::io::Error) -> AcquisitionError {
    AcquisitionError::storage(format!("scanning {}", path.display()), e.to_string())
}

impl UsageSource for DirectoryWalker {
    fn total_bytes(&self) -> Result<u64> {
        Self::directory_bytes(&self.root)
    }
}

/// Converts bytes to megabytes rounded to two decimals.
///
/// # Examples
///
/// ```
/// use orbit_capture::storage::budget::bytes_to_megabytes;
///
/// assert_eq!(bytes_to_megabytes(3_060_000_000), 3060.0);
/// assert_eq!(bytes_to_megabytes(1_234_567), 1.23);
/// ```
#[must_use]
pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    let hundredths = bytes.saturating_add(BYTES_PER_CENTI_MB / 2) / BYTES_PER_CENTI_MB;
    hundredths as f64 / 100.0
}

/// One measurement of the output directory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetReading {
    pub usage_mb: f64,
    pub ceiling_mb: f64,
}

impl BudgetReading {
    /// True once usage meets or exceeds the ceiling
    #[must_use]
    pub fn exceeded(&self) -> bool {
        self.usage_mb >= self.ceiling_mb
    }
}

/// Storage ceiling for the output directory
pub struct StorageBudget {
    source: Box<dyn UsageSource>,
    ceiling_mb: f64,
}

impl std::fmt::Debug for StorageBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBudget")
            .field("ceiling_mb", &self.ceiling_mb)
            .finish_non_exhaustive()
    }
}

impl StorageBudget {
    pub fn new(source: Box<dyn UsageSource>, ceiling_mb: f64) -> Self {
        Self { source, ceiling_mb }
    }

    /// Budget over a directory on disk
    pub fn for_directory<P: AsRef<Path>>(root: P, ceiling_mb: f64) -> Self {
        Self::new(Box::new(DirectoryWalker::new(root)), ceiling_mb)
    }

    #[must_use]
    pub fn ceiling_mb(&self) -> f64 {
        self.ceiling_mb
    }

    /// Measures current usage against the ceiling.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory cannot be enumerated.
    pub fn measure(&self) -> Result<BudgetReading> {
        let bytes = self.source.total_bytes()?;
        let reading = BudgetReading {
            usage_mb: bytes_to_megabytes(bytes),
            ceiling_mb: self.ceiling_mb,
        };
        debug!("Storage usage {:.2} MB of {:.2} MB", reading.usage_mb, reading.ceiling_mb);
        Ok(reading)
    }

    pub fn current_usage_megabytes(&self) -> Result<f64> {
        Ok(self.measure()?.usage_mb)
    }

    pub fn exceeds(&self) -> Result<bool> {
        Ok(self.measure()?.exceeded())
    }
}
