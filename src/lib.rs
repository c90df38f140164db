//! # Orbit Capture Library
//!
//! Time-boxed sensor logging and geotagged image capture for a Raspberry Pi
//! payload with a Sense HAT and camera module.
//!
//! The acquisition loop reads the sensors, appends a CSV record, tags and
//! captures an image, drops near-black frames, and stops cleanly when the
//! time budget runs out, the output directory is full, or anything fails.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod geo;
pub mod imaging;
pub mod logging;
pub mod sensors;
pub mod storage;
