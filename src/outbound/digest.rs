//! Change digest
//!
//! Line-oriented, human-readable summary of one reconciliation. Mailed to the
//! fleet office and appended to the run history log. Nothing parses it back.

use chrono::{DateTime, NaiveDate, Utc};
use fleet_types::{ChangeReport, DateChange, NewEntry};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "N/A".to_string())
}

/// Header line opening each digest and history block
pub fn header_line(timestamp: DateTime<Utc>) -> String {
    format!("=== Update {} ===", timestamp.format(TIMESTAMP_FORMAT))
}

fn new_line(entry: &NewEntry) -> String {
    format!(
        "+ New: {} - expires: {}",
        entry.key,
        fmt_date(entry.expiration_date)
    )
}

fn change_line(change: &DateChange) -> String {
    format!(
        "~ Updated {}: {} -> {}",
        change.key,
        fmt_date(change.old),
        fmt_date(change.new)
    )
}

/// One line per new key, then one per updated key
pub fn entry_lines(report: &ChangeReport) -> Vec<String> {
    report
        .new
        .iter()
        .map(new_line)
        .chain(report.updated.iter().map(change_line))
        .collect()
}

/// Full digest text
pub fn render_digest(report: &ChangeReport, timestamp: DateTime<Utc>) -> String {
    let mut lines = vec![header_line(timestamp)];

    lines.push(String::new());
    if report.new.is_empty() {
        lines.push("No new vehicles.".to_string());
    } else {
        lines.push(format!("{} new vehicles detected:", report.new.len()));
        lines.extend(report.new.iter().map(new_line));
    }

    lines.push(String::new());
    if report.updated.is_empty() {
        lines.push("No expiration date updates.".to_string());
    } else {
        lines.push(format!(
            "{} expiration changes detected:",
            report.updated.len()
        ));
        lines.extend(report.updated.iter().map(change_line));
    }

    if report.duplicates_resolved > 0 {
        lines.push(String::new());
        lines.push(format!(
            "{} duplicate rows were resolved by policy.",
            report.duplicates_resolved
        ));
    }

    lines.join("\n")
}

/// Mail subject: `"<prefix> - YYYY-MM-DD HH:MM:SS"`
pub fn mail_subject(prefix: &str, timestamp: DateTime<Utc>) -> String {
    format!("{} - {}", prefix, timestamp.format(TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_empty_report() {
        let text = render_digest(&ChangeReport::default(), stamp());
        assert_eq!(
            text,
            "=== Update 2024-03-01 10:30:00 ===\n\nNo new vehicles.\n\nNo expiration date updates."
        );
    }

    #[test]
    fn test_one_line_per_entry() {
        let report = ChangeReport {
            new: vec![NewEntry {
                key: "9999XYZ".to_string(),
                expiration_date: None,
            }],
            updated: vec![DateChange {
                key: "1234ABC".to_string(),
                old: Some(ymd(2024, 1, 10)),
                new: Some(ymd(2024, 2, 15)),
            }],
            unchanged: 4,
            duplicates_resolved: 0,
        };
        let text = render_digest(&report, stamp());
        assert!(text.contains("1 new vehicles detected:\n+ New: 9999XYZ - expires: N/A"));
        assert!(text.contains("~ Updated 1234ABC: 2024-01-10 -> 2024-02-15"));

        assert_eq!(
            entry_lines(&report),
            vec![
                "+ New: 9999XYZ - expires: N/A".to_string(),
                "~ Updated 1234ABC: 2024-01-10 -> 2024-02-15".to_string(),
            ]
        );
    }

    #[test]
    fn test_subject() {
        assert_eq!(
            mail_subject("Expiry report", stamp()),
            "Expiry report - 2024-03-01 10:30:00"
        );
    }
}
