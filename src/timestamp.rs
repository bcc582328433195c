//! Timestamp parsing for the problem log.
//!
//! Each value is classified by its shape: ten digits are epoch seconds,
//! thirteen digits are epoch milliseconds, anything else goes through a set
//! of free-form date layouts. Values that fit none of them are missing.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Layouts carrying a UTC offset. The wall time of the offset is kept.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y/%m/%d %H:%M:%S%.f %z",
];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parses one raw `timestamp_TW` cell.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        match raw.len() {
            10 => return epoch_seconds(raw),
            13 => return epoch_millis(raw),
            _ => {}
        }
    }

    parse_free_form(raw)
}

/// Calendar date of a raw timestamp, if it parses.
pub fn date_of(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|ts| ts.date())
}

fn epoch_seconds(raw: &str) -> Option<NaiveDateTime> {
    let secs = raw.parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

fn epoch_millis(raw: &str) -> Option<NaiveDateTime> {
    let millis = raw.parse::<i64>().ok()?;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

fn parse_free_form(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.naive_local());
        }
    }

    let naive = raw
        .strip_suffix("UTC")
        .or_else(|| raw.strip_suffix('Z'))
        .map_or(raw, str::trim_end);

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(naive, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}
