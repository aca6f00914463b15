//! Alert Classifier
//!
//! Pure function of (record, now, window). Urgency is derived from the
//! expiration date alone, then overridden to `Acknowledged` while the record
//! sits inside its notification cooldown.
//!
//! ```text
//! expiration absent                          → Unknown
//! expiration <  today                        → Expired
//! today <= expiration <= today + urgent      → Urgent
//! expiration >  today + urgent               → Upcoming
//! now - last_notified_at < cooldown          → Acknowledged (wins over all)
//! ```
//!
//! Only records with `today - lookback <= expiration <= today + lookahead`
//! reach the output; undated records are included when `include_unknown`.

mod acknowledge;

pub use acknowledge::{apply_acknowledgements, AckOutcome};

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use fleet_types::{AlertEntry, Urgency, VehicleRecord};
use serde::Serialize;
use tracing::debug;

/// Classification horizons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertWindow {
    pub lookback: Duration,
    pub lookahead: Duration,
    pub urgent_within: Duration,
    pub cooldown: Duration,
    pub include_unknown: bool,
}

impl Default for AlertWindow {
    fn default() -> Self {
        crate::config::WindowConfig::default().to_window()
    }
}

/// Date-derived urgency, ignoring notification state
pub fn date_urgency(
    expiration: Option<NaiveDate>,
    today: NaiveDate,
    urgent_within: Duration,
) -> Urgency {
    match expiration {
        None => Urgency::Unknown,
        Some(date) if date < today => Urgency::Expired,
        Some(date) if within_after(date, today, urgent_within) => Urgency::Urgent,
        Some(_) => Urgency::Upcoming,
    }
}

/// True while `now - last_notified_at < cooldown`
pub fn on_cooldown(record: &VehicleRecord, now: DateTime<Utc>, cooldown: Duration) -> bool {
    record
        .last_notified_at
        .is_some_and(|notified| now.signed_duration_since(notified) < cooldown)
}

/// Classify one record, ignoring the window
pub fn classify_record(
    record: &VehicleRecord,
    now: DateTime<Utc>,
    window: &AlertWindow,
) -> AlertEntry {
    let today = now.date_naive();
    let cooling = on_cooldown(record, now, window.cooldown);
    let urgency = if cooling {
        Urgency::Acknowledged
    } else {
        date_urgency(record.expiration_date, today, window.urgent_within)
    };
    AlertEntry {
        record: record.clone(),
        urgency,
        eligible_for_notification: !cooling,
        days_remaining: record
            .expiration_date
            .map(|date| date.signed_duration_since(today).num_days()),
    }
}

/// `date <= today + span`; a span past the calendar range has no upper bound
fn within_after(date: NaiveDate, today: NaiveDate, span: Duration) -> bool {
    today.checked_add_signed(span).map_or(true, |limit| date <= limit)
}

/// `today - span <= date`; a span past the calendar range has no lower bound
fn within_before(date: NaiveDate, today: NaiveDate, span: Duration) -> bool {
    today.checked_sub_signed(span).map_or(true, |limit| limit <= date)
}

fn in_window(expiration: Option<NaiveDate>, today: NaiveDate, window: &AlertWindow) -> bool {
    match expiration {
        None => window.include_unknown,
        Some(date) => {
            within_before(date, today, window.lookback)
                && within_after(date, today, window.lookahead)
        }
    }
}

/// Classify the merged registry. Output keeps input order; nothing is mutated.
pub fn classify(
    merged: &[VehicleRecord],
    now: DateTime<Utc>,
    window: &AlertWindow,
) -> Vec<AlertEntry> {
    let today = now.date_naive();
    let entries: Vec<AlertEntry> = merged
        .iter()
        .filter(|record| in_window(record.expiration_date, today, window))
        .map(|record| classify_record(record, now, window))
        .collect();
    debug!(
        "Classified {} of {} records at {}",
        entries.len(),
        merged.len(),
        now.to_rfc3339()
    );
    entries
}

/// Entries an operator should be prompted about right now
pub fn notifiable(entries: &[AlertEntry]) -> impl Iterator<Item = &AlertEntry> {
    entries.iter().filter(|e| {
        e.eligible_for_notification && matches!(e.urgency, Urgency::Expired | Urgency::Urgent)
    })
}

/// Per-urgency counts for report headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub eligible: usize,
    pub by_urgency: BTreeMap<Urgency, usize>,
}

impl AlertSummary {
    pub fn from_entries(entries: &[AlertEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            *summary.by_urgency.entry(entry.urgency).or_insert(0) += 1;
            if entry.eligible_for_notification {
                summary.eligible += 1;
            }
        }
        summary
    }

    pub fn count(&self, urgency: Urgency) -> usize {
        self.by_urgency.get(&urgency).copied().unwrap_or(0)
    }
}
