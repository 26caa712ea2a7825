//! Wall-clock reminder times and the instants they resolve to.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// How long a snoozed reminder waits before firing again.
pub const SNOOZE_MINUTES: i64 = 30;

/// A daily reminder time in 24-hour `HH:MM` form.
///
/// Parsing accepts a one or two digit hour (`9:05`, `09:05`) and always
/// renders the canonical zero-padded form. Ordering is chronological, so a
/// sorted collection lists times the way the day runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::InvalidTimeFormat(format!(
                "{hour:02}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// The time with the colon removed, e.g. `0900`. Used to build trigger ids.
    pub fn compact(&self) -> String {
        format!("{:02}{:02}", self.hour, self.minute)
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or_default()
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let invalid = || Error::InvalidTimeFormat(format!("expected HH:MM, got {s:?}"));

        let (hours, minutes) = raw.split_once(':').ok_or_else(invalid)?;
        if hours.is_empty()
            || hours.len() > 2
            || minutes.len() != 2
            || !hours.bytes().all(|b| b.is_ascii_digit())
            || !minutes.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let hour: u8 = hours.parse().map_err(|_| invalid())?;
        let minute: u8 = minutes.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The first instant strictly after `now` whose wall-clock time in `now`'s
/// time zone is `time`.
///
/// On a day where `time` does not exist locally (a DST gap) that day is
/// skipped. For an ambiguous local time the earlier instant is used.
pub fn next_occurrence<Tz: TimeZone>(time: TimeOfDay, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let at = time.to_naive_time();

    now.date_naive()
        .iter_days()
        .take(3)
        .find_map(|date| {
            tz.from_local_datetime(&date.and_time(at))
                .earliest()
                .filter(|candidate| candidate > now)
        })
        .unwrap_or_else(|| now.clone() + Duration::days(1))
}

/// When a reminder snoozed at `now` should fire again.
pub fn snooze_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, minutes: i64) -> DateTime<Tz> {
    now.clone() + Duration::minutes(minutes)
}

/// Source of the current instant, injected so schedules can be computed
/// against a controlled time in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
