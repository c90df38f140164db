//! # Geo Module
//!
//! Position lookup and positional image metadata.
//!
//! This module handles:
//! - Reading the current ground position from a provider
//! - Converting latitude/longitude into rational metadata triples
//! - Hemisphere reference flags (N/S, E/W)

pub mod converter;
pub mod position;
