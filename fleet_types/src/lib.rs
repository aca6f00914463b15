//! Fleet Types - Level 1 Foundation Types
//!
//! Pure data structures shared by every stage of the expiry pipeline:
//! normalizer → reconciliation → alert classifier → outbound formatters.
//!
//! ## Architecture Level: LEVEL 1 (Foundation)
//!
//! This crate depends on nothing else in the repository. The application crate
//! owns all behaviour; this crate owns the shapes that flow between stages.
//!
//! ## Critical Rules
//!
//! 1. **NO BUSINESS LOGIC** - Only data structures
//! 2. **NO FUNCTIONS** - Except basic constructors, accessors and `Display`
//! 3. **SERIALIZABLE** - All types must support serde

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// VEHICLE RECORDS
// ============================================================================

/// One registry row: a vehicle (optionally per document type) and its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    /// Normalized match key (trimmed, upper-cased, never empty)
    pub key: String,
    /// Document kind (ITV, insurance, tachograph...) when the source tracks it
    #[serde(default)]
    pub document_type: Option<String>,
    /// Expiration date, absent when unknown or unparsable
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub plate: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Last time an operator acknowledged an alert for this record
    #[serde(default)]
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl VehicleRecord {
    /// Create a record carrying only its key
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            document_type: None,
            expiration_date: None,
            driver: None,
            plate: None,
            company: None,
            phone: None,
            last_notified_at: None,
        }
    }

    pub fn with_expiration(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = Some(plate.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_last_notified(mut self, at: DateTime<Utc>) -> Self {
        self.last_notified_at = Some(at);
        self
    }
}

/// Optional columns a given input variant actually carries.
///
/// Fields whose flag is off are always absent after normalization, whatever
/// the input rows contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldCapabilities {
    pub document_type: bool,
    pub driver: bool,
    pub plate: bool,
    pub company: bool,
    pub phone: bool,
    /// Key becomes `VEHICLE/DOCTYPE` so one vehicle can hold several documents
    pub document_type_in_key: bool,
}

impl Default for FieldCapabilities {
    fn default() -> Self {
        Self {
            document_type: true,
            driver: true,
            plate: true,
            company: true,
            phone: true,
            document_type_in_key: false,
        }
    }
}

impl FieldCapabilities {
    /// Only the key and expiration date (the bare ERP export)
    pub fn minimal() -> Self {
        Self {
            document_type: false,
            driver: false,
            plate: false,
            company: false,
            phone: false,
            document_type_in_key: false,
        }
    }
}

/// Soft-warning counters collected while normalizing one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub rows_in: usize,
    pub records_out: usize,
    /// Non-empty expiration cells that could not be read as a date
    pub unparsable_dates: usize,
    /// Non-empty last-notified cells that could not be read as a timestamp
    pub unparsable_timestamps: usize,
    /// Rows skipped because every key column was blank
    pub blank_keys: usize,
}

impl NormalizeStats {
    pub fn has_warnings(&self) -> bool {
        self.unparsable_dates > 0 || self.unparsable_timestamps > 0 || self.blank_keys > 0
    }
}

// ============================================================================
// DUPLICATE KEY POLICY
// ============================================================================

/// How to resolve several input rows sharing one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail the run, listing the duplicated keys
    Reject,
    /// Later rows replace earlier ones (input order)
    #[default]
    KeepLast,
    /// The row with the latest expiration wins; ties go to the later row
    KeepLatestDate,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::KeepLast => "keep-last",
            Self::KeepLatestDate => "keep-latest-date",
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "keep-last" | "keep_last" => Ok(Self::KeepLast),
            "keep-latest-date" | "keep_latest_date" => Ok(Self::KeepLatestDate),
            other => Err(format!("Unknown duplicate policy: {}", other)),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CHANGE REPORT
// ============================================================================

/// A key that only the weekly feed knew about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub key: String,
    pub expiration_date: Option<NaiveDate>,
}

/// A key whose resolved expiration moved away from the registry value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateChange {
    pub key: String,
    pub old: Option<NaiveDate>,
    pub new: Option<NaiveDate>,
}

/// What one reconciliation changed, in first-encounter key order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub new: Vec<NewEntry>,
    pub updated: Vec<DateChange>,
    pub unchanged: usize,
    /// Input rows discarded by the duplicate policy
    pub duplicates_resolved: usize,
}

impl ChangeReport {
    /// True when the merge added or moved nothing
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty()
    }
}

// ============================================================================
// ALERTS
// ============================================================================

/// Display urgency of one record at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Expiration date absent
    Unknown,
    /// Expired before today
    Expired,
    /// Expires within the urgent horizon (inclusive)
    Urgent,
    /// Expires after the urgent horizon
    Upcoming,
    /// Notified within the cooldown; overrides every date-derived state
    Acknowledged,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Expired => "expired",
            Self::Urgent => "urgent",
            Self::Upcoming => "upcoming",
            Self::Acknowledged => "acknowledged",
        }
    }

    pub fn all() -> [Urgency; 5] {
        [
            Self::Expired,
            Self::Urgent,
            Self::Upcoming,
            Self::Unknown,
            Self::Acknowledged,
        ]
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified record handed to the report and messaging renderers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub record: VehicleRecord,
    pub urgency: Urgency,
    pub eligible_for_notification: bool,
    /// Days from today to expiration (negative once expired)
    pub days_remaining: Option<i64>,
}
