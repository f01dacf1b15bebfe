//! Cron normalization and next-fire lookup on top of the `cron` crate.

use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use cron::Schedule;

use super::ScheduleError;

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires a seconds field: `sec min hour day-of-month month
/// day-of-week [year]`. Job definitions usually carry the 5-field form.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn compile(spec: &str) -> Result<Schedule, ScheduleError> {
    // Shorthands (`@daily`, ...) are understood by the cron crate directly.
    if !spec.starts_with('@') {
        let found = spec.split_whitespace().count();
        if !(5..=7).contains(&found) {
            return Err(ScheduleError::FieldCount {
                spec: spec.to_string(),
                found,
            });
        }
    }

    Schedule::from_str(&normalize_cron(spec)).map_err(|e| ScheduleError::Cron {
        spec: spec.to_string(),
        reason: e.to_string(),
    })
}

/// Cron fires fall on whole seconds. `Schedule::after` is strictly-after, so a
/// whole-second `now` is stepped back one second to include itself.
pub(crate) fn next_at_or_after(schedule: &Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let base = if now.nanosecond() == 0 {
        now - Duration::seconds(1)
    } else {
        now
    };
    schedule.after(&base).next()
}

pub(crate) fn next_strictly_after(schedule: &Schedule, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&t).next()
}
