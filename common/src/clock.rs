use std::{cell::Cell, rc::Rc};

use chrono::{DateTime, FixedOffset, Timelike};

pub trait Clock {
    /// Local wall-clock time, `None` until time is synced or when the
    /// timezone cannot be resolved.
    fn local_now(&self) -> Option<DateTime<FixedOffset>>;
}

/// Fractional minutes since local midnight.
pub fn minute_of_day(now: &DateTime<FixedOffset>) -> f32 {
    let seconds = now.num_seconds_from_midnight() as f32
        + now.nanosecond().min(999_999_999) as f32 / 1e9;
    seconds / 60.0
}

/// Clock whose time is set by hand; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Option<DateTime<FixedOffset>>>>,
}

impl ManualClock {
    pub fn new(now: Option<DateTime<FixedOffset>>) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    /// UTC clock at `hour:minute` on an arbitrary fixed date.
    pub fn at(hour: u32, minute: u32) -> Self {
        let clock = Self::default();
        clock.set_time(hour, minute);
        clock
    }

    pub fn set(&self, now: Option<DateTime<FixedOffset>>) {
        self.now.set(now);
    }

    pub fn set_time(&self, hour: u32, minute: u32) {
        let now = DateTime::parse_from_rfc3339("2024-06-01T00:00:00+00:00")
            .ok()
            .and_then(|midnight| midnight.with_hour(hour))
            .and_then(|time| time.with_minute(minute));
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn local_now(&self) -> Option<DateTime<FixedOffset>> {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_of_day_includes_seconds() {
        let now = DateTime::parse_from_rfc3339("2024-03-10T06:30:30+02:00").unwrap();
        assert_eq!(minute_of_day(&now), 390.5);
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::at(8, 15);
        let reader = clock.clone();

        clock.set_time(21, 0);

        let now = reader.local_now().unwrap();
        assert_eq!(minute_of_day(&now), 21.0 * 60.0);

        clock.set(None);
        assert!(reader.local_now().is_none());
    }
}
