use chrono::{Local, Timelike as _, Utc};
use core::time::Duration;
use std::cell::Cell;

/// Wall clock seam.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
    /// Local hour of day, 0..=23.
    fn local_hour(&self) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }

    fn local_hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: Cell<u64>,
    hour: Cell<u32>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
            hour: Cell::new(12),
        }
    }

    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.now_ms.set(self.now_ms.get().saturating_add(millis));
    }

    pub fn set_hour(&self, hour: u32) {
        self.hour.set(hour % 24);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn local_hour(&self) -> u32 {
        self.hour.get()
    }
}
