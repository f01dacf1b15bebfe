//! `@every <duration>` schedules.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::ScheduleError;

const EVERY_PREFIX: &str = "@every";

/// Returns the duration text when `spec` is an `@every` schedule.
pub(crate) fn strip_every(spec: &str) -> Option<&str> {
    let rest = spec.strip_prefix(EVERY_PREFIX)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

pub(crate) fn compile(spec: &str, duration: &str) -> Result<Duration, ScheduleError> {
    let err = |reason: &str| ScheduleError::Interval {
        spec: spec.to_string(),
        reason: reason.to_string(),
    };
    let period = parse_duration(duration).ok_or_else(|| err("expected e.g. 30s, 5m, 1h30m, 250ms"))?;
    if period.as_millis() == 0 {
        return Err(err("period must be at least 1ms"));
    }
    Ok(period)
}

/// Parse a human-readable duration string into a [`Duration`].
///
/// Supports components: `Xd` (days), `Xh` (hours), `Xm` (minutes),
/// `Xs` (seconds), `Xms` (milliseconds), combinable as in "2h30m" or "1s500ms".
/// A bare number is read as seconds. Returns `None` if the string is empty or
/// unparseable.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total_ms: u64 = 0;
    let mut num_buf = String::new();
    let mut unit_buf = String::new();
    let mut found_unit = false;

    let mut flush = |num: &mut String, unit: &mut String| -> Option<()> {
        let n: u64 = num.parse().ok()?;
        let scale = match unit.as_str() {
            "d" => 86_400_000,
            "h" => 3_600_000,
            "m" => 60_000,
            "s" => 1_000,
            "ms" => 1,
            _ => return None,
        };
        total_ms = total_ms.checked_add(n.checked_mul(scale)?)?;
        num.clear();
        unit.clear();
        Some(())
    };

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            if !unit_buf.is_empty() {
                flush(&mut num_buf, &mut unit_buf)?;
            }
            num_buf.push(ch);
        } else if ch.is_ascii_alphabetic() {
            if num_buf.is_empty() {
                return None;
            }
            unit_buf.push(ch);
            found_unit = true;
        } else {
            return None;
        }
    }

    if !unit_buf.is_empty() {
        flush(&mut num_buf, &mut unit_buf)?;
    } else if !num_buf.is_empty() {
        // Trailing number without unit: only allowed on its own ("90" = 90s).
        if found_unit {
            return None;
        }
        let n: u64 = num_buf.parse().ok()?;
        return Some(Duration::from_secs(n));
    }

    Some(Duration::from_millis(total_ms))
}

fn period_ms(period: Duration) -> i64 {
    i64::try_from(period.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn next_at_or_after(period: Duration, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let p = period_ms(period);
    let ms = now.timestamp_millis();
    let on_millisecond = now.timestamp_subsec_nanos() % 1_000_000 == 0;
    if ms.rem_euclid(p) == 0 && on_millisecond {
        return Some(now);
    }
    next_strictly_after(period, now)
}

pub(crate) fn next_strictly_after(period: Duration, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let p = period_ms(period);
    let ms = t.timestamp_millis();
    let next = (ms - ms.rem_euclid(p)).checked_add(p)?;
    DateTime::from_timestamp_millis(next)
}
