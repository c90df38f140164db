//! Wall-clock source for the acquisition loop

use chrono::{DateTime, Local};

/// Source of the current instant
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// System local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
