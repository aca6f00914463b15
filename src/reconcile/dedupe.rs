//! Duplicate key resolution
//!
//! Spreadsheet sources routinely repeat a vehicle (re-exported rows, manual
//! edits to the master sheet). Which row survives is an explicit policy.

use std::collections::HashMap;

use fleet_types::{DuplicatePolicy, VehicleRecord};
use tracing::warn;

use crate::error::{FleetError, Result};

/// Records with unique keys, in first-occurrence key order
#[derive(Debug, Clone, Default)]
pub struct Deduped {
    pub records: Vec<VehicleRecord>,
    /// Rows discarded by the policy
    pub resolved: usize,
}

/// Resolve duplicate keys under `policy`. Fails only for `reject`.
pub fn dedupe(
    records: &[VehicleRecord],
    policy: DuplicatePolicy,
    source_name: &str,
) -> Result<Deduped> {
    let (deduped, duplicated) = resolve(records, policy);
    if duplicated.is_empty() {
        return Ok(deduped);
    }

    if policy == DuplicatePolicy::Reject {
        return Err(FleetError::DuplicateKeys {
            source_name: source_name.to_string(),
            keys: duplicated,
        });
    }

    warn!(
        "{}: {} duplicate rows over {} keys resolved by {}",
        source_name,
        deduped.resolved,
        duplicated.len(),
        policy
    );
    Ok(deduped)
}

/// `keep-last` resolution, which cannot fail
pub fn keep_last(records: &[VehicleRecord]) -> Deduped {
    resolve(records, DuplicatePolicy::KeepLast).0
}

/// Returns the survivors plus every duplicated key in first-seen order.
/// Under `reject` the first occurrence is kept; the caller decides to fail.
fn resolve(records: &[VehicleRecord], policy: DuplicatePolicy) -> (Deduped, Vec<String>) {
    let mut slots: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    let mut kept: Vec<VehicleRecord> = Vec::with_capacity(records.len());
    let mut duplicated: Vec<String> = Vec::new();
    let mut resolved = 0;

    for record in records {
        let Some(&slot) = slots.get(record.key.as_str()) else {
            slots.insert(record.key.as_str(), kept.len());
            kept.push(record.clone());
            continue;
        };

        resolved += 1;
        if !duplicated.contains(&record.key) {
            duplicated.push(record.key.clone());
        }

        match policy {
            DuplicatePolicy::Reject => {}
            DuplicatePolicy::KeepLast => kept[slot] = record.clone(),
            DuplicatePolicy::KeepLatestDate => {
                // Option ordering puts None below every date; ties go to the later row
                if record.expiration_date >= kept[slot].expiration_date {
                    kept[slot] = record.clone();
                }
            }
        }
    }

    (
        Deduped {
            records: kept,
            resolved,
        },
        duplicated,
    )
}
