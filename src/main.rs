//! # Orbit Capture
//!
//! Sensor logging and geotagged image capture for a Raspberry Pi payload.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, or built-in defaults)
//!    - Create the output directory and start the event log in it
//!    - Open the Sense HAT, camera and position feed
//!    - Create the record file with its header row
//!
//! 2. **Acquisition**
//!    - One record and one image per iteration until the time budget is
//!      spent, the output directory is full, or a fault occurs
//!
//! 3. **Shutdown**
//!    - Log the stop reason and exit
//!
//! # Examples
//!
//! ```bash
//! orbit-capture config/default.toml
//! ```

use anyhow::{Context, Result};
use std::fs;
use tracing::{debug, error, info};

use orbit_capture::acquisition::clock::SystemClock;
use orbit_capture::acquisition::{AcquisitionLoop, Hardware, LoopSettings};
use orbit_capture::config::Config;
use orbit_capture::geo::position::PositionFeed;
use orbit_capture::imaging::camera::{self, RpicamStill};
use orbit_capture::imaging::quality::QualityFilter;
use orbit_capture::logging;
use orbit_capture::sensors::iio::IioSenseBoard;
use orbit_capture::storage::budget::StorageBudget;
use orbit_capture::storage::records::RecordSink;

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load {}", path))?,
        None => Config::default(),
    };

    let output_dir = &config.storage.output_dir;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    logging::init(output_dir, &config.storage.event_log)?;
    info!("Orbit Capture v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut acquisition = match start(&config) {
        Ok(acquisition) => acquisition,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            return Err(e.into());
        }
    };

    let reason = acquisition.run();
    debug!(
        "Stopped ({}): {} iterations, {} images discarded",
        reason,
        acquisition.state().counter,
        acquisition.state().discarded
    );

    Ok(())
}

/// Opens the hardware, configures the camera and creates the record file.
fn start(config: &Config) -> orbit_capture::error::Result<AcquisitionLoop> {
    let sensors = IioSenseBoard::open(&config.sensors.iio_root, &config.sensors.thermal_zone)?;

    let mut camera = RpicamStill::new(config.camera.command.clone());
    camera::configure(&mut camera, &config.camera)?;

    let position = PositionFeed::new(&config.position.feed_path);
    info!("Position feed: {}", position.path().display());

    let sink = RecordSink::initialize(config.storage.data_path())?;

    let hardware = Hardware {
        sensors: Box::new(sensors),
        camera: Box::new(camera),
        position: Box::new(position),
    };

    Ok(AcquisitionLoop::new(
        hardware,
        sink,
        StorageBudget::for_directory(&config.storage.output_dir, config.storage.size_ceiling_mb),
        QualityFilter::new(config.camera.brightness_threshold),
        Box::new(SystemClock),
        LoopSettings::from_config(config),
    ))
}
