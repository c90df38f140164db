//! # Sensor Records
//!
//! One CSV row per completed sensor read, appended to a header-first file.
//!
//! The file is created fresh at startup and only ever appended to. Each row
//! is flushed as soon as it is written so an abrupt stop loses nothing that
//! was already appended.

use chrono::{DateTime, Local};
use csv::Writer;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::sensors::{Orientation, SensorSnapshot, Vector3};

/// Header row, in column order
pub const HEADER: [&str; 8] = [
    "Counter",
    "Date/time",
    "External temp",
    "CPU Temp",
    "Accelerometer (x,y,z)",
    "Magnetometer Edited",
    "Magnetometer Raw",
    "Gyroscope",
];

/// Timestamp format used in the `Date/time` column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Decimal places kept for acceleration
const ACCELERATION_DECIMALS: i32 = 3;

/// One row of the record file
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub sequence: u64,
    pub timestamp: DateTime<Local>,
    pub external_temperature: f64,
    pub cpu_temperature: f64,
    pub acceleration: Vector3,
    pub compass_heading: f64,
    pub compass_raw: Vector3,
    pub orientation: Orientation,
}

// Shortest round-trip form, always with a decimal point ("1.0", not "1")
fn number(value: f64) -> String {
    format!("{:?}", value)
}

impl SensorRecord {
    /// Builds the record for `sequence`, rounding acceleration to 3 decimals.
    #[must_use]
    pub fn new(sequence: u64, timestamp: DateTime<Local>, snapshot: &SensorSnapshot) -> Self {
        Self {
            sequence,
            timestamp,
            external_temperature: snapshot.ambient_temperature,
            cpu_temperature: snapshot.cpu_temperature,
            acceleration: snapshot.acceleration.rounded(ACCELERATION_DECIMALS),
            compass_heading: snapshot.compass_heading,
            compass_raw: snapshot.compass_raw,
            orientation: snapshot.orientation,
        }
    }

    /// Row fields in [`HEADER`] order
    #[must_use]
    pub fn fields(&self) -> [String; 8] {
        let a = &self.acceleration;
        let m = &self.compass_raw;
        let o = &self.orientation;

        [
            self.sequence.to_string(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            number(self.external_temperature),
            number(self.cpu_temperature),
            format!("({}, {}, {})", number(a.x), number(a.y), number(a.z)),
            number(self.compass_heading),
            format!("x: {}, y: {}, z: {}", number(m.x), number(m.y), number(m.z)),
            format!("p: {}, r: {}, y: {}", number(o.pitch), number(o.roll), number(o.yaw)),
        ]
    }
}

/// Append-only CSV sink for [`SensorRecord`]s
pub struct RecordSink {
    writer: Writer<File>,
    path: PathBuf,
    rows: u64,
}

impl std::fmt::Debug for RecordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSink")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl RecordSink {
    /// Creates (or truncates) the record file and writes the header.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written.
    pub fn initialize<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = Writer::from_writer(File::create(&path)?);
        writer.write_record(HEADER)?;
        writer.flush()?;

        info!("Record file created at {}", path.display());
        Ok(Self { writer, path, rows: 0 })
    }

    /// Appends one record and flushes it to the file.
    ///
    /// # Errors
    ///
    /// Returns error if the row cannot be written.
    pub fn append(&mut self, record: &SensorRecord) -> Result<()> {
        self.writer.write_record(record.fields())?;
        self.writer.flush()?;
        self.rows += 1;

        debug!("Appended record {}", record.sequence);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written so far (header excluded)
    pub fn rows(&self) -> u64 {
        self.rows
    }
}
