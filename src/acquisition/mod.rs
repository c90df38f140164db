//! # Acquisition Loop
//!
//! Runs the time-boxed capture mission: one sensor record and one geotagged
//! image per iteration until the time budget runs out, the output directory
//! reaches its ceiling, or anything fails.
//!
//! ## Iteration
//!
//! Each iteration runs these steps strictly in order:
//!
//! 1. Measure the output directory; stop if it is at or over the ceiling
//! 2. Read the sensors and append a record tagged with the counter
//! 3. Fetch the position and set the camera's GPS metadata
//! 4. Capture `img_<counter>.jpg`
//! 5. Evaluate brightness; delete the image if it is too dark
//! 6. Log `iteration <counter>`
//! 7. Increment the counter
//! 8. Re-read the clock; once the time budget is spent the loop stops
//!    before starting another iteration
//!
//! The first iteration always runs, so a zero time budget yields exactly one.
//! A fault in steps 1-5 stops the loop at once with no retry and no rollback:
//! a record appended before the fault stays in the file.
//!
//! ## Counter
//!
//! The counter starts at 0 and advances only when an iteration completes. It
//! is never reused: a discarded image leaves a gap in the file numbering.

pub mod clock;

use chrono::{DateTime, Duration, Local};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info};

use crate::config::{Config, StorageConfig};
use crate::error::{AcquisitionError, Result};
use crate::geo::converter::GeoTag;
use crate::geo::position::PositionProvider;
use crate::imaging::camera::Camera;
use crate::imaging::quality::{QualityFilter, Verdict};
use crate::sensors::{SensorProvider, SensorSnapshot};
use crate::storage::budget::{BudgetReading, StorageBudget};
use crate::storage::records::{RecordSink, SensorRecord};

use clock::Clock;

/// Why the loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Time budget spent (graceful)
    TimeExpired,
    /// Output directory reached its size ceiling
    StorageExceeded,
    /// A collaborator failed; holds `<category>: <message>`
    Error(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeExpired => write!(f, "time budget expired"),
            Self::StorageExceeded => write!(f, "storage ceiling reached"),
            Self::Error(description) => write!(f, "error: {}", description),
        }
    }
}

/// Loop state machine status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStatus {
    Running,
    Stopped(StopReason),
}

/// Counters threaded through every iteration
#[derive(Debug, Clone, PartialEq)]
pub struct LoopState {
    /// Sequence counter shared by record, image and log line
    pub counter: u64,
    pub started_at: DateTime<Local>,
    pub now: DateTime<Local>,
    /// Images deleted by the quality filter
    pub discarded: u64,
}

impl LoopState {
    #[must_use]
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            counter: 0,
            started_at,
            now: started_at,
            discarded: 0,
        }
    }

    /// True once `now` is at or past `started_at + budget`
    #[must_use]
    pub fn deadline_reached(&self, budget: Duration) -> bool {
        self.now >= self.started_at + budget
    }
}

/// Hardware collaborators driven by the loop
pub struct Hardware {
    pub sensors: Box<dyn SensorProvider>,
    pub camera: Box<dyn Camera>,
    pub position: Box<dyn PositionProvider>,
}

/// Fixed inputs of a run
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub time_budget: Duration,
    pub storage: StorageConfig,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            time_budget: config.mission.time_budget(),
            storage: config.storage.clone(),
        }
    }

    pub fn image_path(&self, counter: u64) -> PathBuf {
        self.storage.image_path(counter)
    }
}

/// Result of one iteration that did not fault
#[derive(Debug, Clone, Copy, PartialEq)]
enum Iteration {
    Completed,
    BudgetExceeded(BudgetReading),
}

/// The acquisition state machine
pub struct AcquisitionLoop {
    hardware: Hardware,
    sink: RecordSink,
    budget: StorageBudget,
    filter: QualityFilter,
    clock: Box<dyn Clock>,
    settings: LoopSettings,
    state: LoopState,
    status: LoopStatus,
}

impl fmt::Debug for AcquisitionLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionLoop")
            .field("state", &self.state)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl AcquisitionLoop {
    /// Creates a loop in the `Running` state, starting the clock now.
    ///
    /// The record file, camera settings and hardware handles must already be
    /// set up.
    pub fn new(
        hardware: Hardware,
        sink: RecordSink,
        budget: StorageBudget,
        filter: QualityFilter,
        clock: Box<dyn Clock>,
        settings: LoopSettings,
    ) -> Self {
        let state = LoopState::new(clock.now());

        Self {
            hardware,
            sink,
            budget,
            filter,
            clock,
            settings,
            state,
            status: LoopStatus::Running,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn status(&self) -> &LoopStatus {
        &self.status
    }

    /// Runs iterations until the loop stops.
    pub fn run(&mut self) -> StopReason {
        info!(
            "Acquisition running: time budget {} min, storage ceiling {:.2} MB, brightness threshold {}",
            self.settings.time_budget.num_minutes(),
            self.budget.ceiling_mb(),
            self.filter.threshold()
        );

        loop {
            if let LoopStatus::Stopped(reason) = self.step() {
                return reason;
            }
        }
    }

    /// Runs one iteration and returns the resulting status.
    ///
    /// Once stopped the loop stays stopped: later calls do nothing.
    pub fn step(&mut self) -> LoopStatus {
        if let LoopStatus::Stopped(_) = self.status {
            return self.status.clone();
        }

        self.status = match self.iterate() {
            Ok(Iteration::BudgetExceeded(reading)) => {
                error!(
                    "max size reached: {:.2} MB of {:.2} MB after {} iterations",
                    reading.usage_mb, reading.ceiling_mb, self.state.counter
                );
                LoopStatus::Stopped(StopReason::StorageExceeded)
            }
            Ok(Iteration::Completed) if self.state.deadline_reached(self.settings.time_budget) => {
                info!(
                    "Time budget of {} min elapsed after {} iterations ({} images discarded)",
                    self.settings.time_budget.num_minutes(),
                    self.state.counter,
                    self.state.discarded
                );
                LoopStatus::Stopped(StopReason::TimeExpired)
            }
            Ok(Iteration::Completed) => LoopStatus::Running,
            Err(e) => {
                let description = format!("{}: {}", e.category(), e);
                error!("{}", description);
                LoopStatus::Stopped(StopReason::Error(description))
            }
        };

        self.status.clone()
    }

    fn iterate(&mut self) -> Result<Iteration> {
        let counter = self.state.counter;

        let reading = self.budget.measure()?;
        if reading.exceeded() {
            return Ok(Iteration::BudgetExceeded(reading));
        }

        let snapshot = SensorSnapshot::read(self.hardware.sensors.as_mut())?;
        let record = SensorRecord::new(counter, self.clock.now(), &snapshot);
        self.sink.append(&record)?;

        let coordinates = self.hardware.position.current_coordinates()?;
        let tag = GeoTag::from_coordinates(coordinates)?;
        for (key, value) in tag.metadata() {
            self.hardware.camera.set_metadata(key, &value)?;
        }

        let image_path = self.settings.image_path(counter);
        self.hardware.camera.capture(&image_path)?;

        let verdict = self.filter.evaluate_file(&image_path)?;
        if verdict == Verdict::Discard {
            fs::remove_file(&image_path).map_err(|e| {
                AcquisitionError::storage(
                    format!("deleting {}", image_path.display()),
                    e.to_string(),
                )
            })?;
            self.state.discarded += 1;
            debug!("Discarded dark image {}", image_path.display());
        }

        info!("iteration {}", counter);

        self.state.counter += 1;
        self.state.now = self.clock.now();

        Ok(Iteration::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::clock::mocks::ManualClock;
    use super::clock::SystemClock;
    use super::*;
    use crate::geo::position::{Coordinates, MockPositionProvider};
    use crate::imaging::camera::MockCamera;
    use crate::sensors::{MockSensorProvider, Orientation, Vector3};
    use crate::storage::budget::MockUsageSource;
    use image::{Rgb, RgbImage};
    use std::io;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    /// Log output captured from a `tracing` subscriber
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        (result, buffer.lines())
    }

    fn steady_sensors() -> MockSensorProvider {
        let mut sensors = MockSensorProvider::new();
        sensors.expect_acceleration().returning(|| Ok(Vector3::new(0.0123, 0.0, 0.9991)));
        sensors.expect_compass_heading().returning(|| Ok(182.25));
        sensors.expect_compass_raw().returning(|| Ok(Vector3::new(21.0, -4.5, 38.0)));
        sensors.expect_orientation().returning(|| {
            Ok(Orientation { pitch: 1.5, roll: 358.0, yaw: 182.25 })
        });
        sensors.expect_ambient_temperature().returning(|| Ok(27.5));
        sensors.expect_cpu_temperature().returning(|| Ok(55.0));
        sensors
    }

    fn fixed_position() -> MockPositionProvider {
        let mut position = MockPositionProvider::new();
        position
            .expect_current_coordinates()
            .returning(|| Ok(Coordinates { latitude: -33.5, longitude: 151.25 }));
        position
    }

    fn write_frame(path: &Path, color: Rgb<u8>) {
        RgbImage::from_pixel(8, 8, color).save(path).unwrap();
    }

    /// Camera that writes a frame per capture, colored by `pick(call index)`
    fn scripted_camera(pick: fn(u64) -> Option<Rgb<u8>>) -> MockCamera {
        let mut camera = MockCamera::new();
        camera.expect_set_metadata().returning(|_, _| Ok(()));

        let mut calls = 0u64;
        camera.expect_capture().returning(move |path| {
            let call = calls;
            calls += 1;
            match pick(call) {
                Some(color) => {
                    write_frame(path, color);
                    Ok(())
                }
                None => Err(AcquisitionError::hardware("camera", "capture timed out")),
            }
        });
        camera
    }

    /// Usage source that reports `bytes` for the first `calls` scans, then a full disk
    fn filling_disk(calls: u64) -> MockUsageSource {
        let mut source = MockUsageSource::new();
        let mut scans = 0u64;
        source.expect_total_bytes().returning(move || {
            scans += 1;
            Ok(if scans > calls { 3_060_000_000 } else { 1_000 })
        });
        source
    }

    struct Harness {
        dir: TempDir,
        settings: LoopSettings,
    }

    impl Harness {
        fn new(time_budget: Duration) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Config::default();
            config.storage.output_dir = dir.path().to_path_buf();

            let mut settings = LoopSettings::from_config(&config);
            settings.time_budget = time_budget;
            Self { dir, settings }
        }

        fn build(
            &self,
            camera: MockCamera,
            budget: StorageBudget,
            clock: Box<dyn Clock>,
        ) -> AcquisitionLoop {
            self.build_with(steady_sensors(), camera, budget, clock)
        }

        fn build_with(
            &self,
            sensors: MockSensorProvider,
            camera: MockCamera,
            budget: StorageBudget,
            clock: Box<dyn Clock>,
        ) -> AcquisitionLoop {
            let sink = RecordSink::initialize(self.settings.storage.data_path()).unwrap();
            let hardware = Hardware {
                sensors: Box::new(sensors),
                camera: Box::new(camera),
                position: Box::new(fixed_position()),
            };

            AcquisitionLoop::new(
                hardware,
                sink,
                budget,
                QualityFilter::default(),
                clock,
                self.settings.clone(),
            )
        }

        fn directory_budget(&self) -> StorageBudget {
            StorageBudget::for_directory(self.dir.path(), 3060.0)
        }

        fn record_counters(&self) -> Vec<String> {
            let mut reader = csv::Reader::from_path(self.settings.storage.data_path()).unwrap();
            reader.records().map(|r| r.unwrap()[0].to_string()).collect()
        }

        fn image_exists(&self, counter: u64) -> bool {
            self.settings.image_path(counter).exists()
        }
    }

    #[test]
    fn test_loop_state_deadline() {
        let start = Local::now();
        let mut state = LoopState::new(start);
        assert!(!state.deadline_reached(Duration::minutes(178)));
        assert!(state.deadline_reached(Duration::zero()));

        state.now = start + Duration::minutes(178);
        assert!(state.deadline_reached(Duration::minutes(178)));
    }

    #[test]
    fn test_zero_time_budget_runs_exactly_one_iteration() {
        let harness = Harness::new(Duration::zero());
        let mut acquisition = harness.build(
            scripted_camera(|_| Some(WHITE)),
            harness.directory_budget(),
            Box::new(SystemClock),
        );

        assert_eq!(acquisition.run(), StopReason::TimeExpired);
        assert_eq!(acquisition.state().counter, 1);
        assert_eq!(harness.record_counters(), ["0"]);
        assert!(harness.image_exists(0));
        assert!(!harness.image_exists(1));
    }

    #[test]
    fn test_time_budget_checked_between_iterations() {
        let harness = Harness::new(Duration::minutes(178));
        let clock = ManualClock::new();
        let ticker = clock.clone();

        // Each capture takes an hour of mission time
        let mut camera = MockCamera::new();
        camera.expect_set_metadata().returning(|_, _| Ok(()));
        camera.expect_capture().returning(move |path| {
            ticker.advance(Duration::minutes(60));
            write_frame(path, WHITE);
            Ok(())
        });

        let mut acquisition = harness.build(camera, harness.directory_budget(), Box::new(clock));

        assert_eq!(acquisition.step(), LoopStatus::Running);
        assert_eq!(acquisition.step(), LoopStatus::Running);
        assert_eq!(acquisition.step(), LoopStatus::Stopped(StopReason::TimeExpired));
        assert_eq!(acquisition.state().counter, 3);
    }

    #[test]
    fn test_storage_exceeded_before_any_read() {
        let harness = Harness::new(Duration::minutes(178));

        let mut source = MockUsageSource::new();
        source.expect_total_bytes().returning(|| Ok(3_060_000_000));
        let budget = StorageBudget::new(Box::new(source), 3060.0);

        // No expectations: any sensor read or capture would panic
        let sensors = MockSensorProvider::new();
        let camera = MockCamera::new();

        let mut acquisition = harness.build_with(sensors, camera, budget, Box::new(SystemClock));
        let (reason, logs) = with_captured_logs(|| acquisition.run());

        assert_eq!(reason, StopReason::StorageExceeded);
        assert_eq!(acquisition.state().counter, 0);
        assert!(harness.record_counters().is_empty());
        assert!(!harness.image_exists(0));

        let errors: Vec<_> = logs.iter().filter(|l| l.contains("ERROR")).collect();
        assert_eq!(errors.len(), 1, "{:?}", logs);
        assert!(errors[0].contains("max size reached"));
    }

    #[test]
    fn test_capture_failure_stops_on_iteration_five() {
        let harness = Harness::new(Duration::minutes(178));
        let camera = scripted_camera(|call| if call == 5 { None } else { Some(WHITE) });

        let mut acquisition = harness.build(camera, harness.directory_budget(), Box::new(SystemClock));
        let (reason, logs) = with_captured_logs(|| acquisition.run());

        match reason {
            StopReason::Error(description) => {
                assert!(description.starts_with("HardwareFault: "), "{}", description);
                assert!(description.contains("capture timed out"));
            }
            other => panic!("Expected Error stop, got: {:?}", other),
        }
        assert_eq!(acquisition.state().counter, 5);

        // Record 5 was appended before the capture failed and stays
        assert_eq!(harness.record_counters(), ["0", "1", "2", "3", "4", "5"]);
        for counter in 0..5 {
            assert!(harness.image_exists(counter), "img_{} missing", counter);
        }
        assert!(!harness.image_exists(5));

        let errors = logs.iter().filter(|l| l.contains("ERROR")).count();
        assert_eq!(errors, 1, "{:?}", logs);
        let iterations = logs.iter().filter(|l| l.contains("iteration ")).count();
        assert_eq!(iterations, 5);
    }

    #[test]
    fn test_dark_image_deleted_without_reusing_counter() {
        let harness = Harness::new(Duration::minutes(178));
        let camera = scripted_camera(|call| Some(if call == 1 { BLACK } else { WHITE }));
        let budget = StorageBudget::new(Box::new(filling_disk(3)), 3060.0);

        let mut acquisition = harness.build(camera, budget, Box::new(SystemClock));

        assert_eq!(acquisition.run(), StopReason::StorageExceeded);
        assert_eq!(acquisition.state().counter, 3);
        assert_eq!(acquisition.state().discarded, 1);
        assert!(harness.image_exists(0));
        assert!(!harness.image_exists(1));
        assert!(harness.image_exists(2));
        assert_eq!(harness.record_counters(), ["0", "1", "2"]);
    }

    #[test]
    fn test_geotag_written_before_capture() {
        let harness = Harness::new(Duration::zero());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        let mut camera = MockCamera::new();
        camera.expect_set_metadata().returning(move |key, value| {
            recorder.lock().unwrap().push(format!("{}={}", key, value));
            Ok(())
        });
        let captured_after = seen.clone();
        camera.expect_capture().times(1).returning(move |path| {
            assert_eq!(captured_after.lock().unwrap().len(), 4);
            write_frame(path, WHITE);
            Ok(())
        });

        let mut acquisition = harness.build(camera, harness.directory_budget(), Box::new(SystemClock));
        acquisition.run();

        assert_eq!(
            *seen.lock().unwrap(),
            [
                "GPS.GPSLatitude=33/1,30/1,0/10",
                "GPS.GPSLatitudeRef=S",
                "GPS.GPSLongitude=151/1,15/1,0/10",
                "GPS.GPSLongitudeRef=E",
            ]
        );
    }

    #[test]
    fn test_sensor_failure_appends_nothing() {
        let harness = Harness::new(Duration::minutes(178));
        let mut sensors = MockSensorProvider::new();
        sensors
            .expect_acceleration()
            .returning(|| Err(AcquisitionError::hardware("lsm9ds1_accel", "Failed to read in_accel_x_raw")));

        let mut acquisition =
            harness.build_with(sensors, MockCamera::new(), harness.directory_budget(), Box::new(SystemClock));

        match acquisition.run() {
            StopReason::Error(description) => assert!(description.contains("in_accel_x_raw")),
            other => panic!("Expected Error stop, got: {:?}", other),
        }
        assert!(harness.record_counters().is_empty());
    }

    #[test]
    fn test_scan_failure_is_storage_fault() {
        let harness = Harness::new(Duration::minutes(178));
        let mut source = MockUsageSource::new();
        source
            .expect_total_bytes()
            .returning(|| Err(AcquisitionError::storage("scanning /data", "input/output error")));

        let mut acquisition = harness.build_with(
            MockSensorProvider::new(),
            MockCamera::new(),
            StorageBudget::new(Box::new(source), 3060.0),
            Box::new(SystemClock),
        );

        match acquisition.run() {
            StopReason::Error(description) => assert!(description.starts_with("StorageFault: ")),
            other => panic!("Expected Error stop, got: {:?}", other),
        }
    }

    #[test]
    fn test_stopped_loop_stays_stopped() {
        let harness = Harness::new(Duration::zero());
        let mut camera = MockCamera::new();
        camera.expect_set_metadata().returning(|_, _| Ok(()));
        camera.expect_capture().times(1).returning(|path| {
            write_frame(path, WHITE);
            Ok(())
        });

        let mut acquisition = harness.build(camera, harness.directory_budget(), Box::new(SystemClock));
        acquisition.run();

        assert_eq!(acquisition.step(), LoopStatus::Stopped(StopReason::TimeExpired));
        assert_eq!(acquisition.state().counter, 1);
    }

    #[test]
    fn test_images_count_toward_budget() {
        let harness = Harness::new(Duration::minutes(178));
        // Header row alone stays under 0.01 MB; one image pushes past it
        let budget = StorageBudget::for_directory(harness.dir.path(), 0.01);

        let mut camera = MockCamera::new();
        camera.expect_set_metadata().returning(|_, _| Ok(()));
        camera.expect_capture().times(1).returning(|path| {
            write_frame(path, WHITE);
            let padding = path.with_extension("pad");
            std::fs::write(padding, vec![0u8; 20_000]).unwrap();
            Ok(())
        });

        let mut acquisition = harness.build(camera, budget, Box::new(SystemClock));
        assert_eq!(acquisition.run(), StopReason::StorageExceeded);
        assert_eq!(acquisition.state().counter, 1);
    }
}
