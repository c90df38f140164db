//! # Imaging Module
//!
//! Still capture and image quality filtering.
//!
//! This module handles:
//! - Camera settings and capture through a narrow trait
//! - Driving `rpicam-still` on the Raspberry Pi
//! - Brightness scoring of captured frames

pub mod camera;
pub mod quality;
