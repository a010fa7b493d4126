//! Wall-clock access for the policy and snapshot timestamps.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Local, Timelike, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Local hour of day, `0..=23`.
    fn hour(&self) -> u32;
}

/// The host clock, with hours taken in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// A clock pinned to a settable hour.
#[derive(Debug)]
pub struct FixedClock {
    hour: AtomicU32,
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(hour: u32) -> Self {
        Self {
            hour: AtomicU32::new(hour % 24),
            now: Utc::now(),
        }
    }

    pub fn set_hour(&self, hour: u32) {
        self.hour.store(hour % 24, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn hour(&self) -> u32 {
        self.hour.load(Ordering::SeqCst)
    }
}
