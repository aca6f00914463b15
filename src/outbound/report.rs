//! Alert report
//!
//! Hand-off to the external PDF renderer: a JSON document with the ordered
//! alert entries plus a plain-text table for the mail body and the terminal.
//! The renderer consumes urgency as computed here and never re-classifies.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use fleet_types::{AlertEntry, Urgency};
use serde::Serialize;
use tracing::info;

use crate::alerts::AlertSummary;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct AlertReport {
    pub generated_at: DateTime<Utc>,
    pub summary: AlertSummary,
    pub entries: Vec<AlertEntry>,
}

impl AlertReport {
    pub fn new(entries: Vec<AlertEntry>, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            summary: AlertSummary::from_entries(&entries),
            entries,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!(
            "Wrote alert report ({} entries) to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }

    /// Fixed-width table, one entry per line
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let counts: Vec<String> = Urgency::all()
            .iter()
            .map(|u| format!("{} {}", self.summary.count(*u), u))
            .collect();
        let _ = writeln!(
            out,
            "Alerts: {} ({})",
            self.summary.total,
            counts.join(", ")
        );
        if self.entries.is_empty() {
            return out;
        }
        let _ = writeln!(
            out,
            "{:<13} {:<16} {:<14} {:<10} {:>5}  {}",
            "URGENCY", "KEY", "DOCUMENT", "EXPIRES", "DAYS", "DRIVER"
        );
        for entry in &self.entries {
            let record = &entry.record;
            let _ = writeln!(
                out,
                "{:<13} {:<16} {:<14} {:<10} {:>5}  {}",
                entry.urgency.as_str(),
                record.key,
                record.document_type.as_deref().unwrap_or("-"),
                record
                    .expiration_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                entry
                    .days_remaining
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                record.driver.as_deref().unwrap_or("-"),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use fleet_types::VehicleRecord;

    fn entry(key: &str, urgency: Urgency, days: Option<i64>) -> AlertEntry {
        let mut record = VehicleRecord::new(key);
        record.expiration_date = days.map(|d| {
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(d)
        });
        AlertEntry {
            record,
            urgency,
            eligible_for_notification: urgency != Urgency::Acknowledged,
            days_remaining: days,
        }
    }

    fn report() -> AlertReport {
        AlertReport::new(
            vec![
                entry("A1", Urgency::Expired, Some(-3)),
                entry("B2", Urgency::Urgent, Some(2)),
                entry("C3", Urgency::Unknown, None),
            ],
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_text_table_keeps_entry_order() {
        let text = report().render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Alerts: 3 (1 expired, 1 urgent, 0 upcoming, 1 unknown"));
        assert!(lines[2].starts_with("expired"));
        assert!(lines[2].contains("2024-02-27"));
        assert!(lines[3].contains("B2"));
        assert!(lines[4].starts_with("unknown"));
    }

    #[test]
    fn test_json_carries_urgency() {
        let json: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
        assert_eq!(json["entries"][0]["urgency"], "expired");
        assert_eq!(json["entries"][1]["record"]["key"], "B2");
        assert_eq!(json["summary"]["by_urgency"]["unknown"], 1);
    }
}
