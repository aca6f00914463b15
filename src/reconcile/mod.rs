//! Reconciliation Engine
//!
//! Merges the weekly ERP feed into the master registry by key.
//!
//! - key only in the registry: kept as-is
//! - key only in the weekly feed: new record, never notified
//! - key in both: weekly values win where present, registry fills the gaps,
//!   notification state always comes from the registry
//!
//! The merged registry holds exactly the union of both key sets, sorted by
//! key. Re-running with the same weekly feed against the output changes
//! nothing.

mod dedupe;

pub use dedupe::{dedupe, keep_last, Deduped};

use std::collections::{BTreeMap, HashMap};

use fleet_types::{ChangeReport, DateChange, DuplicatePolicy, NewEntry, VehicleRecord};
use tracing::info;

use crate::error::Result;

/// Merged registry plus what changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub merged: Vec<VehicleRecord>,
    pub report: ChangeReport,
}

/// Reconciliation with an explicit duplicate-key policy
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    policy: DuplicatePolicy,
}

impl Reconciler {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Merge `weekly` into `registry`. Fails only under the `reject` policy.
    pub fn reconcile(
        &self,
        registry: &[VehicleRecord],
        weekly: &[VehicleRecord],
    ) -> Result<Reconciliation> {
        let registry = dedupe(registry, self.policy, "registry")?;
        let weekly = dedupe(weekly, self.policy, "weekly")?;
        Ok(merge(&registry, &weekly))
    }
}

/// Merge with the default `keep-last` policy, which cannot fail
pub fn reconcile(registry: &[VehicleRecord], weekly: &[VehicleRecord]) -> Reconciliation {
    merge(&keep_last(registry), &keep_last(weekly))
}

fn merge(registry: &Deduped, weekly: &Deduped) -> Reconciliation {
    let weekly_by_key: HashMap<&str, &VehicleRecord> = weekly
        .records
        .iter()
        .map(|r| (r.key.as_str(), r))
        .collect();

    let mut report = ChangeReport {
        duplicates_resolved: registry.resolved + weekly.resolved,
        ..Default::default()
    };
    let mut merged: BTreeMap<String, VehicleRecord> = BTreeMap::new();

    for prior in &registry.records {
        let record = match weekly_by_key.get(prior.key.as_str()) {
            None => {
                report.unchanged += 1;
                prior.clone()
            }
            Some(fresh) => {
                let record = merge_pair(prior, fresh);
                if record.expiration_date != prior.expiration_date {
                    report.updated.push(DateChange {
                        key: prior.key.clone(),
                        old: prior.expiration_date,
                        new: record.expiration_date,
                    });
                } else {
                    report.unchanged += 1;
                }
                record
            }
        };
        merged.insert(record.key.clone(), record);
    }

    for fresh in &weekly.records {
        if merged.contains_key(&fresh.key) {
            continue;
        }
        let record = VehicleRecord {
            last_notified_at: None,
            ..fresh.clone()
        };
        report.new.push(NewEntry {
            key: record.key.clone(),
            expiration_date: record.expiration_date,
        });
        merged.insert(record.key.clone(), record);
    }

    info!(
        "Reconciled {} registry + {} weekly records: {} new, {} updated, {} unchanged",
        registry.records.len(),
        weekly.records.len(),
        report.new.len(),
        report.updated.len(),
        report.unchanged
    );

    Reconciliation {
        merged: merged.into_values().collect(),
        report,
    }
}

/// Weekly wins field by field where it has a value; registry owns notification state
fn merge_pair(prior: &VehicleRecord, fresh: &VehicleRecord) -> VehicleRecord {
    let pick =
        |fresh: &Option<String>, prior: &Option<String>| fresh.clone().or_else(|| prior.clone());
    VehicleRecord {
        key: prior.key.clone(),
        document_type: pick(&fresh.document_type, &prior.document_type),
        expiration_date: fresh.expiration_date.or(prior.expiration_date),
        driver: pick(&fresh.driver, &prior.driver),
        plate: pick(&fresh.plate, &prior.plate),
        company: pick(&fresh.company, &prior.company),
        phone: pick(&fresh.phone, &prior.phone),
        last_notified_at: prior.last_notified_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FleetError;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekly_date_wins_and_reports_update() {
        let registry = vec![VehicleRecord::new("1234ABC").with_expiration(ymd(2024, 1, 10))];
        let weekly = vec![VehicleRecord::new("1234ABC").with_expiration(ymd(2024, 2, 15))];

        let out = reconcile(&registry, &weekly);
        assert_eq!(out.merged.len(), 1);
        assert_eq!(out.merged[0].expiration_date, Some(ymd(2024, 2, 15)));
        assert_eq!(
            out.report.updated,
            vec![DateChange {
                key: "1234ABC".to_string(),
                old: Some(ymd(2024, 1, 10)),
                new: Some(ymd(2024, 2, 15)),
            }]
        );
        assert!(out.report.new.is_empty());
    }

    #[test]
    fn test_new_key_into_empty_registry() {
        let weekly = vec![VehicleRecord::new("9999XYZ").with_expiration(ymd(2024, 6, 1))];
        let out = reconcile(&[], &weekly);
        assert_eq!(out.merged.len(), 1);
        assert_eq!(
            out.report.new,
            vec![NewEntry {
                key: "9999XYZ".to_string(),
                expiration_date: Some(ymd(2024, 6, 1)),
            }]
        );
        assert!(out.report.updated.is_empty());
    }

    #[test]
    fn test_new_record_never_carries_notification_state() {
        let stamped = VehicleRecord::new("9999XYZ")
            .with_last_notified(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let out = reconcile(&[], &[stamped]);
        assert!(out.merged[0].last_notified_at.is_none());
    }

    #[test]
    fn test_absent_weekly_values_fall_back_to_registry() {
        let notified = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let registry = vec![VehicleRecord::new("1234ABC")
            .with_expiration(ymd(2024, 1, 10))
            .with_document_type("ITV")
            .with_driver("Ana")
            .with_phone("600111222")
            .with_last_notified(notified)];
        let weekly = vec![VehicleRecord::new("1234ABC").with_driver("Luis")];

        let out = reconcile(&registry, &weekly);
        let merged = &out.merged[0];
        assert_eq!(merged.expiration_date, Some(ymd(2024, 1, 10)));
        assert_eq!(merged.document_type.as_deref(), Some("ITV"));
        assert_eq!(merged.driver.as_deref(), Some("Luis"));
        assert_eq!(merged.phone.as_deref(), Some("600111222"));
        assert_eq!(merged.last_notified_at, Some(notified));
        assert!(out.report.is_empty());
        assert_eq!(out.report.unchanged, 1);
    }

    #[test]
    fn test_registry_without_date_gains_one() {
        let registry = vec![VehicleRecord::new("A1")];
        let weekly = vec![VehicleRecord::new("A1").with_expiration(ymd(2024, 4, 4))];
        let out = reconcile(&registry, &weekly);
        assert_eq!(out.report.updated.len(), 1);
        assert_eq!(out.report.updated[0].old, None);
        assert_eq!(out.report.updated[0].new, Some(ymd(2024, 4, 4)));
    }

    #[test]
    fn test_merged_sorted_and_report_in_encounter_order() {
        let registry = vec![
            VehicleRecord::new("Z9").with_expiration(ymd(2024, 1, 1)),
            VehicleRecord::new("M5").with_expiration(ymd(2024, 1, 1)),
            VehicleRecord::new("K0"),
        ];
        let weekly = vec![
            VehicleRecord::new("M5").with_expiration(ymd(2024, 2, 2)),
            VehicleRecord::new("Z9").with_expiration(ymd(2024, 2, 2)),
            VehicleRecord::new("C3"),
            VehicleRecord::new("B2"),
        ];
        let out = reconcile(&registry, &weekly);

        let keys: Vec<_> = out.merged.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["B2", "C3", "K0", "M5", "Z9"]);

        let updated: Vec<_> = out.report.updated.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(updated, vec!["Z9", "M5"]);
        let new: Vec<_> = out.report.new.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(new, vec!["C3", "B2"]);
        assert_eq!(out.report.unchanged, 1);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let registry = vec![VehicleRecord::new("A1").with_expiration(ymd(2024, 1, 1))];
        let weekly = vec![
            VehicleRecord::new("A1").with_expiration(ymd(2024, 9, 1)),
            VehicleRecord::new("B2").with_expiration(ymd(2024, 9, 2)),
        ];
        let first = reconcile(&registry, &weekly);
        let second = reconcile(&first.merged, &weekly);
        assert_eq!(second.merged, first.merged);
        assert!(second.report.is_empty());
    }

    #[test]
    fn test_duplicate_weekly_keys_last_wins_by_default() {
        let weekly = vec![
            VehicleRecord::new("A1").with_expiration(ymd(2024, 9, 1)),
            VehicleRecord::new("A1").with_expiration(ymd(2024, 3, 1)),
        ];
        let out = reconcile(&[], &weekly);
        assert_eq!(out.merged.len(), 1);
        assert_eq!(out.merged[0].expiration_date, Some(ymd(2024, 3, 1)));
        assert_eq!(out.report.duplicates_resolved, 1);
    }

    #[test]
    fn test_reject_policy_fails_before_merging() {
        let weekly = vec![VehicleRecord::new("A1"), VehicleRecord::new("A1")];
        let err = Reconciler::new(DuplicatePolicy::Reject)
            .reconcile(&[], &weekly)
            .unwrap_err();
        assert!(matches!(err, FleetError::DuplicateKeys { .. }));
    }

    #[test]
    fn test_keep_latest_date_policy() {
        let weekly = vec![
            VehicleRecord::new("A1").with_expiration(ymd(2024, 9, 1)),
            VehicleRecord::new("A1").with_expiration(ymd(2024, 3, 1)),
        ];
        let out = Reconciler::new(DuplicatePolicy::KeepLatestDate)
            .reconcile(&[], &weekly)
            .unwrap();
        assert_eq!(out.merged[0].expiration_date, Some(ymd(2024, 9, 1)));
    }
}
