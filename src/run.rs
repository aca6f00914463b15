//! Batch driver
//!
//! Wires the pure stages to the filesystem for one scheduled run:
//! load, normalize, reconcile, acknowledge, classify, save, then the
//! outbound side effects. Anything that fails before the save aborts the run
//! with the registry file untouched. Side effects after the save (history log,
//! report, mail) are best effort and never undo it.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fleet_types::{AlertEntry, ChangeReport, NormalizeStats, VehicleRecord};
use serde::Serialize;
use tracing::{info, warn};

use crate::alerts::{self, apply_acknowledgements, AckOutcome};
use crate::config::FleetConfig;
use crate::normalizer::{self, NormalizeSpec, Normalized, RawTable, Source};
use crate::outbound::{self, AlertReport, MailSender, MessageLinkBuilder};
use crate::reconcile::{dedupe, Reconciler};
use crate::tabular;

/// Per-run switches that are not part of the persistent configuration
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub now: DateTime<Utc>,
    /// Compute everything, write nothing
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            now: Utc::now(),
            dry_run: false,
        }
    }
}

/// What a batch run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub changes: ChangeReport,
    pub registry_stats: NormalizeStats,
    pub weekly_stats: NormalizeStats,
    pub acknowledgements: AckOutcome,
    pub alerts: AlertReport,
    pub saved: bool,
    pub mail_sent: bool,
}

fn normalize_file(path: &Path, source: Source, config: &FleetConfig) -> Result<Normalized> {
    let table = tabular::load_table(path)?;
    let spec = NormalizeSpec::for_source(source, config);
    let normalized = normalizer::normalize(&table, &spec)
        .with_context(|| format!("Failed to normalize {}", path.display()))?;
    info!(
        "{}: {} records from {} rows",
        source.as_str(),
        normalized.records.len(),
        normalized.stats.rows_in
    );
    Ok(normalized)
}

/// Registry snapshot. A missing file is the first run: an empty registry.
pub fn load_registry(config: &FleetConfig) -> Result<Normalized> {
    let path = &config.paths.registry;
    if !path.exists() {
        warn!("Registry {} not found, starting empty", path.display());
        let spec = NormalizeSpec::for_source(Source::Registry, config);
        let empty = RawTable::new(spec.required.clone(), Vec::new());
        return Ok(normalizer::normalize(&empty, &spec)?);
    }
    normalize_file(path, Source::Registry, config)
}

/// Weekly ERP export. Must exist.
pub fn load_weekly(config: &FleetConfig) -> Result<Normalized> {
    let path = &config.paths.weekly;
    anyhow::ensure!(
        path.exists(),
        "Weekly snapshot not found: {}",
        path.display()
    );
    normalize_file(path, Source::Weekly, config)
}

/// Acknowledgement flags from the UI host, `None` when no file is waiting
pub fn load_acknowledgements(path: &Path) -> Result<Option<BTreeMap<String, bool>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read acknowledgements: {}", path.display()))?;
    let acks: BTreeMap<String, bool> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid acknowledgements file: {}", path.display()))?;
    Ok(Some(acks))
}

/// Move a consumed acknowledgement file aside so its flags are not replayed
fn retire_acknowledgements(path: &Path) -> Result<PathBuf> {
    let mut name = path.as_os_str().to_owned();
    name.push(".applied");
    let target = PathBuf::from(name);
    std::fs::rename(path, &target)
        .with_context(|| format!("Failed to retire {}", path.display()))?;
    Ok(target)
}

/// Append one digest block to the history log
pub fn append_history(path: &Path, digest: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open history log: {}", path.display()))?;
    writeln!(file, "{}", digest)?;
    Ok(())
}

/// Registry with the configured duplicate policy applied
fn deduped_registry(config: &FleetConfig) -> Result<Vec<VehicleRecord>> {
    let registry = load_registry(config)?;
    Ok(dedupe(&registry.records, config.duplicates, "registry")?.records)
}

/// Full scheduled run
pub fn run_batch(
    config: &FleetConfig,
    options: &RunOptions,
    mailer: &dyn MailSender,
) -> Result<RunSummary> {
    let now = options.now;
    info!("Starting batch run at {}", now.to_rfc3339());

    let registry = load_registry(config)?;
    let weekly = load_weekly(config)?;

    let reconciliation = Reconciler::new(config.duplicates)
        .reconcile(&registry.records, &weekly.records)
        .context("Reconciliation failed")?;
    let mut merged = reconciliation.merged;

    let ack_path = &config.paths.acknowledgements;
    let acknowledgements = match load_acknowledgements(ack_path)? {
        Some(acks) => apply_acknowledgements(&mut merged, &acks, now),
        None => AckOutcome::default(),
    };

    let entries = alerts::classify(&merged, now, &config.window.to_window());
    let report = AlertReport::new(entries, now);

    let mut summary = RunSummary {
        changes: reconciliation.report,
        registry_stats: registry.stats,
        weekly_stats: weekly.stats,
        acknowledgements,
        alerts: report,
        saved: false,
        mail_sent: false,
    };

    if options.dry_run {
        info!("Dry run: registry, history, report and mail left untouched");
        return Ok(summary);
    }

    tabular::save_registry(&config.paths.registry, &merged, &config.capabilities)?;
    summary.saved = true;

    if ack_path.exists() {
        match retire_acknowledgements(ack_path) {
            Ok(target) => info!("Acknowledgements moved to {}", target.display()),
            Err(e) => warn!("{:#}", e),
        }
    }

    let digest = outbound::render_digest(&summary.changes, now);
    if let Err(e) = append_history(&config.paths.history_log, &digest) {
        warn!("History log not updated: {:#}", e);
    }
    if let Err(e) = summary.alerts.write_json(&config.paths.report) {
        warn!("Alert report not written: {}", e);
    }

    let subject = outbound::mail_subject(&config.mail.subject_prefix, now);
    let body = format!("{}\n{}", digest, summary.alerts.render_text());
    match mailer.send(&subject, &body) {
        Ok(()) => summary.mail_sent = true,
        Err(e) => warn!("Mail not sent, registry already saved: {}", e),
    }

    info!(
        "Batch run done: {} new, {} updated, {} alerts",
        summary.changes.new.len(),
        summary.changes.updated.len(),
        summary.alerts.entries.len()
    );
    Ok(summary)
}

/// Classify the saved registry without reconciling
pub fn classify_registry(config: &FleetConfig, now: DateTime<Utc>) -> Result<AlertReport> {
    let registry = deduped_registry(config)?;
    let entries = alerts::classify(&registry, now, &config.window.to_window());
    Ok(AlertReport::new(entries, now))
}

/// Stamp `now` on the given keys and re-save the registry
pub fn acknowledge_keys(
    config: &FleetConfig,
    keys: &[String],
    now: DateTime<Utc>,
) -> Result<AckOutcome> {
    let mut registry = deduped_registry(config)?;
    let acks: BTreeMap<String, bool> = keys.iter().map(|k| (k.clone(), true)).collect();
    let outcome = apply_acknowledgements(&mut registry, &acks, now);
    if !outcome.applied.is_empty() {
        tabular::save_registry(&config.paths.registry, &registry, &config.capabilities)?;
    }
    Ok(outcome)
}

/// A notifiable alert and its deep link (if the record has a usable phone)
#[derive(Debug, Clone, Serialize)]
pub struct AlertLink {
    pub entry: AlertEntry,
    pub link: Option<String>,
}

/// Deep links for every alert the UI host should offer to send
pub fn alert_links(config: &FleetConfig, now: DateTime<Utc>) -> Result<Vec<AlertLink>> {
    let builder = MessageLinkBuilder::new(&config.messaging)?;
    let report = classify_registry(config, now)?;
    alerts::notifiable(&report.entries)
        .map(|entry| -> Result<AlertLink> {
            Ok(AlertLink {
                link: builder.link(&entry.record)?,
                entry: entry.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::NullMailer;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> FleetConfig {
        let mut config = FleetConfig::default();
        config.paths.registry = dir.join("master.csv");
        config.paths.weekly = dir.join("erp.csv");
        config.paths.history_log = dir.join("history.txt");
        config.paths.report = dir.join("report.json");
        config.paths.acknowledgements = dir.join("acks.json");
        config
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_first_run_without_registry() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.paths.weekly, "VEHICULO,FECHA DE VENCIN\n1234 abc,2024-03-04\n")
            .unwrap();

        let options = RunOptions { now: now(), dry_run: false };
        let summary = run_batch(&config, &options, &NullMailer).unwrap();

        assert!(summary.saved);
        assert!(summary.mail_sent);
        assert_eq!(summary.changes.new.len(), 1);
        assert_eq!(summary.changes.new[0].key, "1234ABC");
        assert_eq!(summary.alerts.entries.len(), 1);
        assert!(config.paths.registry.exists());
    }

    #[test]
    fn test_missing_weekly_is_fatal() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let err = run_batch(&config, &RunOptions::default(), &NullMailer).unwrap_err();
        assert!(err.to_string().contains("Weekly snapshot not found"));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.paths.weekly, "VEHICLE,EXPIRATION_DATE\nA1,2024-03-04\n").unwrap();

        let options = RunOptions { now: now(), dry_run: true };
        let summary = run_batch(&config, &options, &NullMailer).unwrap();

        assert!(!summary.saved);
        assert!(!config.paths.registry.exists());
        assert!(!config.paths.history_log.exists());
        assert!(!config.paths.report.exists());
    }

    #[test]
    fn test_acknowledge_keys_stamps_and_saves() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(
            &config.paths.registry,
            "VEHICLE,EXPIRATION_DATE,LAST_NOTIFIED_AT\nA1,2024-03-02,\nB2,2024-03-03,\n",
        )
        .unwrap();

        let outcome = acknowledge_keys(&config, &["a1".to_string(), "zz".to_string()], now())
            .unwrap();
        assert_eq!(outcome.applied, vec!["A1"]);
        assert_eq!(outcome.unknown_keys, vec!["zz"]);

        let report = classify_registry(&config, now()).unwrap();
        assert_eq!(report.entries[0].urgency, fleet_types::Urgency::Acknowledged);
        assert_eq!(report.entries[1].urgency, fleet_types::Urgency::Urgent);
    }

    #[test]
    fn test_append_history_accumulates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.txt");
        append_history(&path, "first").unwrap();
        append_history(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
