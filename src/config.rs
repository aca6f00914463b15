//! Run configuration
//!
//! Every knob the pipeline needs is an externally supplied constant: column
//! sets, alias table, alert window, duplicate policy, messaging prefix and
//! file locations. Loaded from YAML; every field has a default so an empty
//! file (or no file at all) is a valid configuration.
//!
//! ```yaml
//! columns:
//!   key_columns: [VEHICLE, PLATE]
//!   weekly_required: [VEHICLE, EXPIRATION_DATE]
//!   aliases:
//!     "FECHA DE VENCIN": EXPIRATION_DATE
//! capabilities:
//!   document_type: false
//! window:
//!   urgent_within_days: 7
//!   cooldown_days: 7
//! duplicates: keep-latest-date
//! messaging:
//!   country_code: "34"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Duration;
use fleet_types::{DuplicatePolicy, FieldCapabilities};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alerts::AlertWindow;
use crate::error::{FleetError, Result};
use crate::normalizer::columns;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub columns: ColumnConfig,
    pub capabilities: FieldCapabilities,
    pub window: WindowConfig,
    pub duplicates: DuplicatePolicy,
    pub messaging: MessagingConfig,
    pub mail: MailConfig,
    pub paths: PathsConfig,
}

impl FleetConfig {
    /// Load config from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        debug!("Loaded fleet config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.columns.normalize_aliases();
        config.validate()?;
        Ok(config)
    }

    /// Use the file when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.key_columns.is_empty() {
            return Err(FleetError::Config(
                "columns.key_columns must name at least one column".to_string(),
            ));
        }
        self.window.validate()?;
        if self.messaging.country_code.is_empty()
            || !self.messaging.country_code.chars().all(|c| c.is_ascii_digit())
        {
            return Err(FleetError::Config(format!(
                "messaging.country_code must be digits only, got {:?}",
                self.messaging.country_code
            )));
        }
        Ok(())
    }
}

/// Column sets and the header alias table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Canonical columns tried in order; the first non-blank one forms the key
    pub key_columns: Vec<String>,
    pub registry_required: Vec<String>,
    pub weekly_required: Vec<String>,
    /// Source header (normalized) -> canonical header
    pub aliases: BTreeMap<String, String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            key_columns: vec![columns::VEHICLE.to_string(), columns::PLATE.to_string()],
            registry_required: vec![
                columns::VEHICLE.to_string(),
                columns::EXPIRATION_DATE.to_string(),
            ],
            weekly_required: vec![
                columns::VEHICLE.to_string(),
                columns::EXPIRATION_DATE.to_string(),
            ],
            aliases: columns::default_aliases(),
        }
    }
}

impl ColumnConfig {
    /// Bring hand-written alias entries into the same trimmed, upper-cased
    /// form that incoming headers are matched in
    pub fn normalize_aliases(&mut self) {
        self.aliases = std::mem::take(&mut self.aliases)
            .into_iter()
            .map(|(from, to)| (columns::normalize_header(&from), columns::normalize_header(&to)))
            .collect();
    }
}

/// Longest accepted window horizon (about a century)
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Alert window in whole days
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub lookback_days: i64,
    pub lookahead_days: i64,
    pub urgent_within_days: i64,
    pub cooldown_days: i64,
    /// Whether records without an expiration date reach the alert list
    pub include_unknown: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            lookahead_days: 60,
            urgent_within_days: 7,
            cooldown_days: 7,
            include_unknown: true,
        }
    }
}

impl WindowConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("lookback_days", self.lookback_days),
            ("lookahead_days", self.lookahead_days),
            ("urgent_within_days", self.urgent_within_days),
            ("cooldown_days", self.cooldown_days),
        ] {
            if !(0..=MAX_WINDOW_DAYS).contains(&value) {
                return Err(FleetError::Config(format!(
                    "window.{} must be between 0 and {}, got {}",
                    name, MAX_WINDOW_DAYS, value
                )));
            }
        }
        Ok(())
    }

    pub fn to_window(&self) -> AlertWindow {
        AlertWindow {
            lookback: Duration::days(self.lookback_days),
            lookahead: Duration::days(self.lookahead_days),
            urgent_within: Duration::days(self.urgent_within_days),
            cooldown: Duration::days(self.cooldown_days),
            include_unknown: self.include_unknown,
        }
    }
}

/// WhatsApp deep-link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Prefix added to local numbers (digits, no `+`)
    pub country_code: String,
    /// Digit count that marks a number as local
    pub local_number_len: usize,
    /// Handlebars template over driver, plate, key, document_type, expiration_date
    pub template: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            country_code: "34".to_string(),
            local_number_len: 9,
            template: crate::outbound::whatsapp::DEFAULT_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub subject_prefix: String,
    /// Directory drained by the external mail relay
    pub outbox_dir: PathBuf,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            subject_prefix: "Expiry report".to_string(),
            outbox_dir: PathBuf::from("outbox"),
        }
    }
}

/// Snapshot and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub registry: PathBuf,
    pub weekly: PathBuf,
    /// Append-only run history
    pub history_log: PathBuf,
    /// JSON alert report handed to the PDF renderer
    pub report: PathBuf,
    /// Acknowledgement flags written by the UI host
    pub acknowledgements: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("vencimientos.csv"),
            weekly: PathBuf::from("vencimientos_erp.csv"),
            history_log: PathBuf::from("log_actualizacion.txt"),
            report: PathBuf::from("alert_report.json"),
            acknowledgements: PathBuf::from("acknowledgements.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{normalize, NormalizeSpec, RawRow, RawTable, Source};

    #[test]
    fn test_empty_yaml_is_default() {
        let config = FleetConfig::from_yaml("").unwrap();
        assert_eq!(config.window.cooldown_days, 7);
        assert_eq!(config.duplicates, DuplicatePolicy::KeepLast);
        assert_eq!(config.messaging.country_code, "34");
        assert!(config.columns.aliases.contains_key("FECHA DE VENCIN"));
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
window:
  urgent_within_days: 14
duplicates: keep-latest-date
capabilities:
  phone: false
"#;
        let config = FleetConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.window.urgent_within_days, 14);
        assert_eq!(config.window.lookahead_days, 60);
        assert_eq!(config.duplicates, DuplicatePolicy::KeepLatestDate);
        assert!(!config.capabilities.phone);
        assert!(config.capabilities.driver);
    }

    #[test]
    fn test_negative_window_rejected() {
        let err = FleetConfig::from_yaml("window:\n  cooldown_days: -1\n").unwrap_err();
        assert!(matches!(err, FleetError::Config(_)));
    }

    #[test]
    fn test_oversized_window_rejected() {
        let err = FleetConfig::from_yaml("window:\n  lookahead_days: 100000000\n").unwrap_err();
        assert!(err.to_string().contains("window.lookahead_days"));
        assert!(FleetConfig::from_yaml("window:\n  lookback_days: 36500\n").is_ok());
    }

    #[test]
    fn test_yaml_aliases_match_any_case() {
        let yaml = r#"
columns:
  aliases:
    "Fecha de Vencin": EXPIRATION_DATE
    vehiculo: vehicle
"#;
        let config = FleetConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.columns.aliases["FECHA DE VENCIN"], columns::EXPIRATION_DATE);
        assert_eq!(config.columns.aliases["VEHICULO"], columns::VEHICLE);

        let spec = NormalizeSpec::for_source(Source::Weekly, &config);
        let row: RawRow = [("VEHICULO", "1234ABC"), ("FECHA DE VENCIN", "2024-02-15")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let out = normalize(&RawTable::from_rows(vec![row]), &spec).unwrap();
        assert_eq!(out.records[0].key, "1234ABC");
        assert!(out.records[0].expiration_date.is_some());
    }

    #[test]
    fn test_country_code_must_be_digits() {
        let err = FleetConfig::from_yaml("messaging:\n  country_code: \"+34\"\n").unwrap_err();
        assert!(err.to_string().contains("country_code"));
    }

    #[test]
    fn test_window_conversion() {
        let window = WindowConfig::default().to_window();
        assert_eq!(window.cooldown, Duration::days(7));
        assert_eq!(window.urgent_within, Duration::days(7));
        assert!(window.include_unknown);
    }

    #[test]
    fn test_sample_config_parses() {
        let config = FleetConfig::from_yaml(include_str!("../config/fleet.yaml")).unwrap();
        assert_eq!(config.mail.subject_prefix, "Reporte Vencimientos");
        assert_eq!(config.columns.aliases["FECHA DE VENCIN"], columns::EXPIRATION_DATE);
        assert!(crate::outbound::MessageLinkBuilder::new(&config.messaging).is_ok());
    }
}
