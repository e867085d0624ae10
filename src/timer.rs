use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::config::ElapsedUnit;
use crate::error::TimerError;

/// Source of wall-clock time for a session.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Handy in tests that assert on `elapsed` or on entry timestamps.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Start/end bookkeeping for one session.
///
/// `start` and `end` each take effect once; later calls keep the first
/// reading.
pub struct Timer {
    unit: ElapsedUnit,
    clock: Arc<dyn Clock>,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
}

impl Timer {
    pub fn new(unit: ElapsedUnit) -> Self {
        Self::with_clock(unit, Arc::new(SystemClock))
    }

    pub fn with_clock(unit: ElapsedUnit, clock: Arc<dyn Clock>) -> Self {
        Self { unit, clock, start_at: None, end_at: None }
    }

    pub fn start(&mut self) {
        if self.start_at.is_none() {
            self.start_at = Some(self.clock.now());
        }
    }

    pub fn end(&mut self) {
        if self.end_at.is_none() {
            self.end_at = Some(self.clock.now());
        }
    }

    pub fn start_time(&self) -> Result<DateTime<Utc>, TimerError> {
        self.start_at.ok_or(TimerError::NotStarted)
    }

    pub fn end_time(&self) -> Result<DateTime<Utc>, TimerError> {
        self.end_at.ok_or(TimerError::NotEnded)
    }

    /// Live clock reading, independent of `start`/`end`.
    pub fn current_time(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// `(end or now) - start`, scaled to the configured unit.
    pub fn elapsed(&self) -> Result<i64, TimerError> {
        let start = self.start_time()?;
        let until = self.end_at.unwrap_or_else(|| self.current_time());
        Ok(self.unit.scale(until - start))
    }

    pub fn unit(&self) -> ElapsedUnit {
        self.unit
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("unit", &self.unit)
            .field("start_at", &self.start_at)
            .field("end_at", &self.end_at)
            .finish()
    }
}
