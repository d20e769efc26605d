//! Injectable time source.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Wall-clock time source.
///
/// Scheduling works in absolute wall-clock instants, so the clock is the one
/// seam tests need to control: inject a [`ManualClock`] and the engine will
/// dispatch exactly at the timestamps the test sets.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time in seconds since the Unix epoch, fractional.
    fn now(&self) -> f64;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// Manually advanced clock for tests. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    /// A clock frozen at `now`.
    pub fn at(now: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, now: f64) {
        *self.now.lock() = now;
    }

    /// Move forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        *self.now.lock() += seconds;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}
