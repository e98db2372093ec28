use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use ledbrick_common::Clock;

/// Wall clock before this year is treated as not yet synced.
const MIN_SYNCED_YEAR: i32 = 2020;

pub struct SystemClock {
    timezone: String,
}

impl SystemClock {
    pub fn new(timezone: impl Into<String>) -> Self {
        Self {
            timezone: timezone.into(),
        }
    }
}

impl Clock for SystemClock {
    fn local_now(&self) -> Option<DateTime<FixedOffset>> {
        now_in_timezone(&self.timezone, Utc::now())
    }
}

fn now_in_timezone(timezone: &str, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
    if now.year() < MIN_SYNCED_YEAR {
        return None;
    }
    let tz: Tz = timezone.parse().ok()?;
    let local = now.with_timezone(&tz);
    Some(local.with_timezone(&local.offset().fix()))
}
