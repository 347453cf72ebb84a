//! Normalization of user supplied post dates.
//!
//! WordPress reads a naive `date` in the site's own time zone, so the wall
//! clock time the user wrote is kept as-is instead of being converted.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Wire format of the `date` field.
const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

static DATE_TIME_MINUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}$").expect("Invalid date regex"));
static DATE_TIME_SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}$").expect("Invalid date regex"));
static DATE_SPACE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}$").expect("Invalid date regex"));
static DATE_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Invalid date regex"));

/// Naive layouts tried after the fast paths, in order.
const GENERIC_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];
const GENERIC_DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%d %B %Y"];

/// Convert a date string to `YYYY-MM-DDTHH:MM:SS`.
///
/// Returns `None` for blank or unparseable input; callers treat that as
/// "let the server pick the date".
///
/// # Examples
///
/// ```
/// # use wp_blog_poster::date::normalize_date;
/// assert_eq!(normalize_date("2024-05-01 09:30").as_deref(), Some("2024-05-01T09:30:00"));
/// assert_eq!(normalize_date("2024-05-01").as_deref(), Some("2024-05-01T00:00:00"));
/// assert_eq!(normalize_date("someday"), None);
/// ```
#[must_use]
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let candidate = if DATE_TIME_MINUTES.is_match(value) {
        format!("{value}:00")
    } else if DATE_TIME_SECONDS.is_match(value) {
        value.to_string()
    } else if DATE_SPACE_TIME.is_match(value) {
        format!("{}:00", value.replacen(' ', "T", 1))
    } else if DATE_ONLY.is_match(value) {
        format!("{value}T00:00:00")
    } else {
        return parse_generic(value).map(normalize_datetime);
    };

    // Shape matched; still refuse impossible calendar values like 2024-13-40
    NaiveDateTime::parse_from_str(&candidate, WIRE_FORMAT)
        .ok()
        .map(|_| candidate)
}

/// Format an already parsed local date-time for the wire.
#[must_use]
pub fn normalize_datetime(value: NaiveDateTime) -> String {
    value.format(WIRE_FORMAT).to_string()
}

fn parse_generic(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for format in GENERIC_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in GENERIC_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}
