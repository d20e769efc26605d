//! Retry timing policy.
//!
//! A pure mapping from attempt count to the absolute instant of the next
//! attempt. Retry instants are always computed from the record's creation
//! time, never from the previous attempt, so sender latency does not make
//! the schedule drift.

use serde::{Deserialize, Serialize};

/// Fixed-table retry policy.
///
/// `retry_delays_secs[i]` is the delay from creation of the attempt made
/// after `i` completed failures; index 0 is the initial attempt and must be
/// zero. A record whose failure count walks off the end of the table is
/// terminally failed.
///
/// Default table: immediate, 1m, 5m, 30m, 2h, 6h — then give up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "defaults::retry_delays_secs")]
    pub retry_delays_secs: Vec<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delays_secs: defaults::retry_delays_secs(),
        }
    }
}

impl RetryPolicy {
    /// Highest permitted failure count; one less than the table length.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "validated tables are tiny"
    )]
    pub fn max_attempts(&self) -> u32 {
        self.retry_delays_secs.len().saturating_sub(1) as u32
    }

    /// Whether a record with `attempts_completed` failures gets another try.
    pub fn should_retry(&self, attempts_completed: u32) -> bool {
        attempts_completed <= self.max_attempts()
    }

    /// Absolute instant of the attempt following `attempts_completed`
    /// failures, or `None` once the table is exhausted.
    #[allow(
        clippy::cast_precision_loss,
        reason = "delays are far below the 2^52 precision limit"
    )]
    pub fn next_retry_at(&self, created_at: f64, attempts_completed: u32) -> Option<f64> {
        self.retry_delays_secs
            .get(attempts_completed as usize)
            .map(|delay| created_at + *delay as f64)
    }

    /// Reject tables that would break the scheduling invariants.
    ///
    /// # Errors
    /// If the table is empty, the first delay is non-zero, or the delays
    /// are not strictly increasing.
    pub fn validate(&self) -> Result<(), String> {
        match self.retry_delays_secs.first() {
            None => return Err("retry delay table must not be empty".to_string()),
            Some(&first) if first != 0 => {
                return Err("the initial attempt must have zero delay".to_string());
            }
            Some(_) => {}
        }

        if !self.retry_delays_secs.windows(2).all(|w| w[0] < w[1]) {
            return Err("retry delays must be strictly increasing".to_string());
        }

        Ok(())
    }
}

mod defaults {
    pub fn retry_delays_secs() -> Vec<u64> {
        vec![0, 60, 300, 1800, 7200, 21600]
    }
}
