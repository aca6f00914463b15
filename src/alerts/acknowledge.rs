//! Acknowledgement write-back
//!
//! The UI host collects one "notified" flag per key between classifier runs.
//! This is the only mutation outside reconciliation: it stamps
//! `last_notified_at = now` on the merged registry itself, so the following
//! save persists it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fleet_types::VehicleRecord;
use serde::Serialize;
use tracing::{info, warn};

use crate::normalizer::columns::normalize_key;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AckOutcome {
    /// Keys stamped with `now`
    pub applied: Vec<String>,
    /// Keys already stamped at or after `now`, left untouched
    pub stale: Vec<String>,
    /// Flagged keys with no registry record
    pub unknown_keys: Vec<String>,
}

/// Apply `true` flags from `acks` to `registry`. `false` flags are ignored.
///
/// `last_notified_at` never moves backwards: a record already stamped at or
/// after `now` is reported as stale instead.
pub fn apply_acknowledgements(
    registry: &mut [VehicleRecord],
    acks: &BTreeMap<String, bool>,
    now: DateTime<Utc>,
) -> AckOutcome {
    let mut outcome = AckOutcome::default();
    let flagged: BTreeMap<String, &str> = acks
        .iter()
        .filter(|(_, flag)| **flag)
        .map(|(key, _)| (normalize_key(key), key.as_str()))
        .collect();

    let mut matched = 0;
    for record in registry.iter_mut() {
        if !flagged.contains_key(&record.key) {
            continue;
        }
        matched += 1;
        match record.last_notified_at {
            Some(previous) if previous >= now => outcome.stale.push(record.key.clone()),
            _ => {
                record.last_notified_at = Some(now);
                outcome.applied.push(record.key.clone());
            }
        }
    }

    if matched < flagged.len() {
        let known: std::collections::HashSet<&str> =
            registry.iter().map(|r| r.key.as_str()).collect();
        outcome.unknown_keys = flagged
            .iter()
            .filter(|(key, _)| !known.contains(key.as_str()))
            .map(|(_, raw)| raw.to_string())
            .collect();
        warn!(
            "Ignored acknowledgements for unknown keys: {}",
            outcome.unknown_keys.join(", ")
        );
    }

    info!(
        "Acknowledgements: {} applied, {} stale, {} unknown",
        outcome.applied.len(),
        outcome.stale.len(),
        outcome.unknown_keys.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn acks(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_true_flags_stamp_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut registry = vec![VehicleRecord::new("1234ABC"), VehicleRecord::new("9999XYZ")];

        let outcome = apply_acknowledgements(
            &mut registry,
            &acks(&[(" 1234 abc", true), ("9999XYZ", false)]),
            now,
        );

        assert_eq!(outcome.applied, vec!["1234ABC".to_string()]);
        assert_eq!(registry[0].last_notified_at, Some(now));
        assert_eq!(registry[1].last_notified_at, None);
    }

    #[test]
    fn test_never_moves_backwards() {
        let later = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut registry = vec![VehicleRecord::new("A").with_last_notified(later)];

        let outcome = apply_acknowledgements(&mut registry, &acks(&[("A", true)]), earlier);

        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.stale, vec!["A".to_string()]);
        assert_eq!(registry[0].last_notified_at, Some(later));
    }

    #[test]
    fn test_unknown_keys_reported() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut registry = vec![VehicleRecord::new("A")];
        let outcome = apply_acknowledgements(&mut registry, &acks(&[("zz 1", true)]), now);
        assert_eq!(outcome.unknown_keys, vec!["zz 1".to_string()]);
        assert!(outcome.applied.is_empty());
    }
}
