//! # Camera Module
//!
//! Camera abstraction and a still-capture driver built on `rpicam-still`.
//!
//! Settings (resolution, preview, metadata) are accumulated on the driver and
//! applied on every [`Camera::capture`] call, so a capture always carries the
//! most recent geotag.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::config::CameraConfig;
use crate::error::{AcquisitionError, Result};

/// Still camera used by the acquisition loop
#[cfg_attr(test, mockall::automock)]
pub trait Camera {
    /// Enable or disable the on-screen preview
    fn set_preview(&mut self, enabled: bool) -> Result<()>;

    /// Set capture resolution in pixels
    fn set_resolution(&mut self, width: u32, height: u32) -> Result<()>;

    /// Set a metadata tag written into subsequent captures
    fn set_metadata(&mut self, key: &str, value: &str) -> Result<()>;

    /// Capture one still image to `path`
    fn capture(&mut self, path: &Path) -> Result<()>;
}

/// Applies the startup camera settings.
///
/// # Errors
///
/// Propagates any camera error.
pub fn configure(camera: &mut dyn Camera, config: &CameraConfig) -> Result<()> {
    camera.set_resolution(config.width, config.height)?;
    camera.set_preview(config.preview)?;
    info!(
        "Camera configured: {}x{}, preview {}",
        config.width,
        config.height,
        if config.preview { "on" } else { "off" }
    );
    Ok(())
}

/// Still camera driven through the `rpicam-still` command line tool.
#[derive(Debug, Clone)]
pub struct RpicamStill {
    command: String,
    width: u32,
    height: u32,
    preview: bool,
    metadata: BTreeMap<String, String>,
}

impl RpicamStill {
    /// Creates a driver invoking `command` (usually `rpicam-still`).
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
            width: 1296,
            height: 972,
            preview: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Arguments for a capture to `path`
    fn capture_args(&self, path: &Path) -> Vec<String> {
        let mut args = vec![
            "--output".to_string(),
            path.to_string_lossy().to_string(),
            "--width".to_string(),
            self.width.to_string(),
            "--height".to_string(),
            self.height.to_string(),
            "--immediate".to_string(),
        ];

        if !self.preview {
            args.push("--nopreview".to_string());
        }

        for (key, value) in &self.metadata {
            args.push("--exif".to_string());
            args.push(format!("{}={}", key, value));
        }

        args
    }
}

impl Camera for RpicamStill {
    fn set_preview(&mut self, enabled: bool) -> Result<()> {
        self.preview = enabled;
        Ok(())
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(AcquisitionError::hardware(
                "camera",
                format!("Invalid resolution {}x{}", width, height),
            ));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        self.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn capture(&mut self, path: &Path) -> Result<()> {
        let args = self.capture_args(path);
        debug!("{} args: {:?}", self.command, args);

        let output = Command::new(&self.command)
            .args(&args)
            .output()
            .map_err(|e| {
                AcquisitionError::hardware(
                    "camera",
                    format!("Failed to spawn {}: {}", self.command, e),
                )
            })?;

        if !output.status.success() {
            return Err(AcquisitionError::hardware(
                "camera",
                format!(
                    "{} exited with {}: {}",
                    self.command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        Ok(())
    }
}
