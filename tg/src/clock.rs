//! Time source for cooldown and queue bookkeeping

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Supplies the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        debug!(%start, "ManualClock::new: called");
        Self { now: Mutex::new(start) }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        debug!(?by, "ManualClock::advance: called");
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Jump to an absolute time
    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(61));
        assert_eq!(clock.now() - start, Duration::minutes(61));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::default();
        let target = Utc::now() + Duration::days(1);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
