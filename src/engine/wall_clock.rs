//! Wall-clock time source, swappable for a manual one in tests.

use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, SystemTime},
};

/// Source of wall-clock time for timestamps and the undo window.
pub trait WallClock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// Wall clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually driven wall clock, for replays and tests.
#[derive(Debug)]
pub struct ManualWallClock {
    now: Mutex<SystemTime>,
}

impl ManualWallClock {
    /// Start the clock at `start`.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }
}

impl WallClock for ManualWallClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
