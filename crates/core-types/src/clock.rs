use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use parking_lot::Mutex;

/// Source of wall-clock time for start/stop dates.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    /// Today at midnight.
    fn today(&self) -> NaiveDateTime {
        let now = self.now();
        now.date().and_hms_opt(0, 0, 0).unwrap_or(now)
    }
}

/// Stop date the legacy schema treats as "never expires".
pub fn never_expires() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MAX)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock();
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn today_drops_time_of_day() {
        let clock = FixedClock::new(at(2026, 3, 14, 15, 9));
        assert_eq!(clock.today(), at(2026, 3, 14, 0, 0));
    }

    #[test]
    fn advance_moves_fixed_clock() {
        let clock = FixedClock::new(at(2026, 3, 14, 23, 30));
        clock.advance(Duration::hours(1));
        assert_eq!(clock.today(), at(2026, 3, 15, 0, 0));
    }

    #[test]
    fn never_is_end_of_year_9999() {
        assert_eq!(never_expires(), at(9999, 12, 31, 0, 0));
    }
}
