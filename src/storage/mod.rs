//! # Storage Module
//!
//! Everything the loop persists, and the ceiling on how much it may persist.
//!
//! This module handles:
//! - Measuring the output directory against the size ceiling
//! - Creating the record file and appending one CSV row per iteration

pub mod budget;
pub mod records;
