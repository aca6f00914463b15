//! Fleet document-expiry reconciliation
//!
//! Keeps a master registry of vehicle documents in sync with the weekly ERP
//! export and decides which expirations need a reminder.
//!
//! ## Pipeline
//! Snapshots -> Normalizer -> Reconciler -> Acknowledgements -> Classifier
//! -> atomic save -> digest / report / mail
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fleet_expiry::alerts::{classify, AlertWindow};
//! use fleet_expiry::reconcile::reconcile;
//! use fleet_types::VehicleRecord;
//!
//! let registry = vec![VehicleRecord::new("1234ABC")];
//! let weekly = vec![VehicleRecord::new("9999XYZ")];
//! let result = reconcile(&registry, &weekly);
//! let alerts = classify(&result.merged, chrono::Utc::now(), &AlertWindow::default());
//! println!("{} new, {} alerts", result.report.new.len(), alerts.len());
//! ```

// Core error handling
pub mod error;

// YAML run configuration
pub mod config;

// Raw rows -> canonical records
pub mod normalizer;

// Registry/weekly merge and change report
pub mod reconcile;

// Urgency classification and acknowledgement write-back
pub mod alerts;

// Digest, alert report, WhatsApp links, mail boundary
pub mod outbound;

// CSV snapshots and atomic registry save
pub mod tabular;

// Batch driver
pub mod run;

pub use config::FleetConfig;
pub use error::{FleetError, Result};
pub use fleet_types::{
    AlertEntry, ChangeReport, DuplicatePolicy, FieldCapabilities, Urgency, VehicleRecord,
};
