//! Recurrence schedules for alert jobs.
//!
//! A job's `interval` text compiles into a [`Schedule`] that answers "when is
//! the next fire at or after `t`". Three spellings are accepted:
//!
//! - cron with 5 fields (`min hour dom month dow`), 6 fields (leading seconds)
//!   or 7 fields (trailing year)
//! - the `@yearly`, `@monthly`, `@weekly`, `@daily` and `@hourly` shorthands
//! - `@every <duration>` (`@every 1m`, `@every 1h30m`, `@every 250ms`), whose
//!   fires are aligned to multiples of the period since the Unix epoch
//!
//! Compilation is the only fallible step; `next` is pure.

pub(crate) mod cron;
pub(crate) mod interval;


use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use self::interval::parse_duration;

/// Schedule compilation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("schedule is empty")]
    Empty,

    #[error("expected 5, 6 or 7 cron fields, found {found} in {spec:?}")]
    FieldCount { spec: String, found: usize },

    #[error("invalid cron expression {spec:?}: {reason}")]
    Cron { spec: String, reason: String },

    #[error("invalid @every duration {spec:?}: {reason}")]
    Interval { spec: String, reason: String },
}

#[derive(Debug, Clone)]
enum Recurrence {
    Cron(Box<::cron::Schedule>),
    Every(Duration),
}

/// A compiled recurrence.
#[derive(Debug, Clone)]
pub struct Schedule {
    source: String,
    recurrence: Recurrence,
}

impl Schedule {
    pub fn compile(spec: &str) -> Result<Self, ScheduleError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::Empty);
        }

        let recurrence = match interval::strip_every(trimmed) {
            Some(rest) => Recurrence::Every(interval::compile(trimmed, rest)?),
            None => Recurrence::Cron(Box::new(cron::compile(trimmed)?)),
        };

        Ok(Self {
            source: trimmed.to_string(),
            recurrence,
        })
    }

    /// The spec text this schedule was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// First fire instant `>= now`, or `None` if the schedule is exhausted.
    pub fn next(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.recurrence {
            Recurrence::Cron(s) => cron::next_at_or_after(s, now),
            Recurrence::Every(p) => interval::next_at_or_after(*p, now),
        }
    }

    /// First fire instant strictly after `t`.
    pub fn next_after(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.recurrence {
            Recurrence::Cron(s) => cron::next_strictly_after(s, t),
            Recurrence::Every(p) => interval::next_strictly_after(*p, t),
        }
    }

    /// Up to `n` successive fires starting at or after `from`.
    pub fn upcoming(&self, from: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
        let mut fires = Vec::with_capacity(n);
        let mut cursor = self.next(from);
        while let Some(at) = cursor {
            if fires.len() == n {
                break;
            }
            fires.push(at);
            cursor = self.next_after(at);
        }
        fires
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
