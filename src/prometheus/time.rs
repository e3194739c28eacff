//! Duration and timestamp parsing for query arguments.
//!
//! Durations follow the Prometheus/Go grammar (`300ms`, `1.5h`, `1h30m`) and
//! additionally accept whole days (`7d`) and weeks (`2w`).

use chrono::{DateTime, FixedOffset, Local, TimeDelta, TimeZone};

use crate::error::ParseError;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MINUTE: u64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MINUTE;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

/// Parse a duration such as `30s`, `1h30m`, `1d` or `2w`.
///
/// `d` and `w` only accept a whole (optionally signed) count, so `1.5d` and
/// `1h2d` are rejected.
pub fn parse_duration(input: &str) -> Result<TimeDelta, ParseError> {
    let invalid = || ParseError::InvalidDuration(input.to_string());

    if input.is_empty() {
        return Err(invalid());
    }

    if input.len() > 1 {
        if let Some(weeks) = input.strip_suffix('w') {
            return whole_units(weeks, SECONDS_PER_WEEK).ok_or_else(invalid);
        }
        if let Some(days) = input.strip_suffix('d') {
            return whole_units(days, SECONDS_PER_DAY).ok_or_else(invalid);
        }
    }

    parse_native_duration(input).ok_or_else(invalid)
}

/// Parse an RFC3339 timestamp, falling back to Unix epoch seconds.
///
/// Epoch timestamps are materialised in the local time zone. The instant is
/// the same either way; only the attached offset differs from what an
/// RFC3339 input would carry.
pub fn parse_timestamp(input: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts);
    }

    if let Ok(secs) = input.parse::<i64>() {
        if let Some(ts) = Local.timestamp_opt(secs, 0).single() {
            return Ok(ts.fixed_offset());
        }
    }

    Err(ParseError::InvalidTimestamp(input.to_string()))
}

fn whole_units(count: &str, unit_secs: i64) -> Option<TimeDelta> {
    let count: i64 = count.parse().ok()?;
    TimeDelta::try_seconds(count.checked_mul(unit_secs)?)
}

/// Sequence of `<decimal><unit>` groups with an optional leading sign.
fn parse_native_duration(input: &str) -> Option<TimeDelta> {
    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Some(TimeDelta::zero());
    }
    if rest.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    while !rest.is_empty() {
        let (whole, after_whole) = split_digits(rest);
        let (fraction, after_number) = match after_whole.strip_prefix('.') {
            Some(tail) => split_digits(tail),
            None => ("", after_whole),
        };
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }

        let unit_end = after_number
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after_number.len());
        let (unit, tail) = after_number.split_at(unit_end);
        let unit_nanos = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SECOND,
            "m" => NANOS_PER_MINUTE,
            "h" => NANOS_PER_HOUR,
            _ => return None,
        };

        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut value = whole.checked_mul(unit_nanos)?;
        if !fraction.is_empty() {
            // Digits beyond nanosecond precision of the largest unit are noise.
            let digits = &fraction[..fraction.len().min(18)];
            let numerator: u128 = digits.parse().ok()?;
            let scale = 10u128.checked_pow(digits.len() as u32)?;
            let nanos = numerator.checked_mul(u128::from(unit_nanos))? / scale;
            value = value.checked_add(u64::try_from(nanos).ok()?)?;
        }

        total = total.checked_add(value)?;
        if total > i64::MAX as u64 {
            return None;
        }
        rest = tail;
    }

    let nanos = total as i64;
    Some(TimeDelta::nanoseconds(if negative { -nanos } else { nanos }))
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}
