//! Typed errors for the expiry pipeline.
//!
//! Only structural problems are errors. Unparsable dates, blank keys and
//! resolved duplicates are soft warnings counted in `NormalizeStats` /
//! `ChangeReport` and never stop a run.

use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    /// Required column absent after header normalization and aliasing
    #[error("{source_name}: missing required columns: {}", join_set(missing))]
    MissingColumns {
        source_name: String,
        missing: BTreeSet<String>,
    },

    /// Raised only under the `reject` duplicate policy
    #[error("{source_name}: duplicate keys rejected: {}", keys.join(", "))]
    DuplicateKeys {
        source_name: String,
        keys: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FleetError>;

fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}
