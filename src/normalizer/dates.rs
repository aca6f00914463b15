//! Lenient date parsing for spreadsheet cells
//!
//! Exports arrive with ISO dates, Spanish day-first dates, pandas-style
//! `2024-01-10 00:00:00` stamps or raw spreadsheet serial numbers. Anything
//! that cannot be read is `None`; callers count it, nobody raises.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// Spreadsheet serial numbers accepted as dates (1927-05-18 ..= 2173-10-14)
const SERIAL_RANGE: std::ops::RangeInclusive<i64> = 10_000..=100_000;

/// Parse an expiration cell
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    // Drop a trailing time part: "2024-01-10 00:00:00", "2024-01-10T08:00"
    let date_part = raw
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or(raw);

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
    }

    parse_serial(raw)
}

/// Parse a last-notified cell: RFC 3339, naive `YYYY-MM-DD HH:MM:SS` (UTC), or a
/// bare date (midnight UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    parse_date(raw)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_serial(raw: &str) -> Option<NaiveDate> {
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let days = value.trunc() as i64;
    if !SERIAL_RANGE.contains(&days) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(days))
}
