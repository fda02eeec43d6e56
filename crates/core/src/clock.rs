//! Monotonic Clock
//!
//! Wall-clock timestamps truncated to microseconds, never repeating or going
//! backwards within one process.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

use crate::error::{CoreError, CoreResult};

/// Timestamp type used by every entity
pub type Timestamp = DateTime<Utc>;

/// Smallest step between two issued timestamps
pub fn tick() -> Duration {
    Duration::microseconds(1)
}

/// Source of strictly increasing timestamps.
#[derive(Debug)]
pub struct MonotonicClock {
    last: Mutex<Option<Timestamp>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    /// Current time, strictly later than any value this clock returned before.
    pub fn now(&self) -> Timestamp {
        let wall = Utc::now().trunc_subsecs(6);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = match *last {
            Some(prev) if wall <= prev => prev + tick(),
            _ => wall,
        };
        *last = Some(next);
        next
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// `now`, or one tick past `previous` if the stored value is not older.
pub fn later_than(now: Timestamp, previous: Timestamp) -> Timestamp {
    if now > previous {
        now
    } else {
        previous + tick()
    }
}

/// Fixed-width RFC 3339 text (`2026-10-19T08:30:00.000000Z`); sorts lexically
/// in time order.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> CoreResult<Timestamp> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::parse(format!("Invalid timestamp '{}': {}", raw, e)))
}
