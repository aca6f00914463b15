//! Record Normalizer
//!
//! Turns raw tabular rows (column name → cell text) from either source into
//! canonical [`VehicleRecord`]s:
//!
//! 1. headers are trimmed, upper-cased and mapped through the alias table
//! 2. required columns are checked up front; any gap aborts the whole source
//! 3. each row yields one record keyed by the first non-blank key column
//!
//! Unparsable dates and blank keys are soft warnings counted in
//! [`NormalizeStats`], never errors.

pub mod columns;
pub mod dates;

use std::collections::{BTreeMap, BTreeSet};

use fleet_types::{FieldCapabilities, NormalizeStats, VehicleRecord};
use tracing::{debug, warn};

use crate::config::{ColumnConfig, FleetConfig};
use crate::error::{FleetError, Result};

/// One raw spreadsheet row: header → cell text
pub type RawRow = BTreeMap<String, String>;

/// Raw rows plus the header line they came with
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { headers, rows }
    }

    /// Build from rows alone; headers are the union of row keys in first-seen order
    pub fn from_rows(rows: Vec<RawRow>) -> Self {
        let mut seen = BTreeSet::new();
        let mut headers = Vec::new();
        for row in &rows {
            for header in row.keys() {
                if seen.insert(header.clone()) {
                    headers.push(header.clone());
                }
            }
        }
        Self { headers, rows }
    }
}

/// Which source is being normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Registry,
    Weekly,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Weekly => "weekly",
        }
    }
}

/// Everything the normalizer needs to know about one source
#[derive(Debug, Clone)]
pub struct NormalizeSpec {
    pub source_name: String,
    pub required: Vec<String>,
    pub aliases: BTreeMap<String, String>,
    pub key_columns: Vec<String>,
    pub capabilities: FieldCapabilities,
    /// The weekly feed never carries notification state
    pub read_last_notified: bool,
}

impl NormalizeSpec {
    pub fn for_source(source: Source, config: &FleetConfig) -> Self {
        let ColumnConfig {
            key_columns,
            registry_required,
            weekly_required,
            aliases,
        } = &config.columns;
        let required = match source {
            Source::Registry => registry_required,
            Source::Weekly => weekly_required,
        };
        Self {
            source_name: source.as_str().to_string(),
            required: required.clone(),
            aliases: aliases.clone(),
            key_columns: key_columns.clone(),
            capabilities: config.capabilities,
            read_last_notified: source == Source::Registry,
        }
    }
}

/// Normalizer output
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<VehicleRecord>,
    pub stats: NormalizeStats,
}

/// Normalize one source. Pure: no I/O, no partial results on failure.
pub fn normalize(table: &RawTable, spec: &NormalizeSpec) -> Result<Normalized> {
    let canonical: Vec<(String, String)> = table
        .headers
        .iter()
        .map(|raw| (raw.clone(), columns::canonical_header(raw, &spec.aliases)))
        .collect();

    let present: BTreeSet<&str> = canonical.iter().map(|(_, c)| c.as_str()).collect();
    let missing: BTreeSet<String> = spec
        .required
        .iter()
        .map(|col| columns::normalize_header(col))
        .filter(|col| !present.contains(col.as_str()))
        .collect();
    if !missing.is_empty() {
        return Err(FleetError::MissingColumns {
            source_name: spec.source_name.clone(),
            missing,
        });
    }

    let key_columns: Vec<String> = spec
        .key_columns
        .iter()
        .map(|col| columns::normalize_header(col))
        .collect();

    let mut stats = NormalizeStats {
        rows_in: table.rows.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(table.rows.len());

    for (idx, row) in table.rows.iter().enumerate() {
        let cells = canonical_cells(row, &canonical);
        match build_record(&cells, &key_columns, spec, &mut stats) {
            Some(record) => records.push(record),
            None => {
                stats.blank_keys += 1;
                debug!("{}: row {} has no key, skipped", spec.source_name, idx + 1);
            }
        }
    }

    stats.records_out = records.len();
    if stats.has_warnings() {
        warn!(
            "{}: {} unparsable dates, {} unparsable timestamps, {} rows without key",
            spec.source_name, stats.unparsable_dates, stats.unparsable_timestamps, stats.blank_keys
        );
    }
    debug!(
        "{}: normalized {} of {} rows",
        spec.source_name, stats.records_out, stats.rows_in
    );

    Ok(Normalized { records, stats })
}

/// Re-key a row by canonical header. When two source headers alias to the
/// same column, the first non-blank cell wins.
fn canonical_cells<'a>(
    row: &'a RawRow,
    canonical: &'a [(String, String)],
) -> BTreeMap<&'a str, &'a str> {
    let mut cells: BTreeMap<&str, &str> = BTreeMap::new();
    for (raw, canon) in canonical {
        let Some(value) = row.get(raw) else {
            continue;
        };
        let value = value.trim();
        let slot = cells.entry(canon.as_str()).or_insert("");
        if slot.is_empty() {
            *slot = value;
        }
    }
    cells
}

fn build_record(
    cells: &BTreeMap<&str, &str>,
    key_columns: &[String],
    spec: &NormalizeSpec,
    stats: &mut NormalizeStats,
) -> Option<VehicleRecord> {
    let cell = |name: &str| -> Option<String> {
        cells
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let caps = &spec.capabilities;

    let base_key = key_columns
        .iter()
        .filter_map(|col| cell(col.as_str()))
        .map(|v| columns::normalize_key(&v))
        .find(|k| !k.is_empty())?;

    let document_type = if caps.document_type || caps.document_type_in_key {
        cell(columns::DOCUMENT_TYPE)
    } else {
        None
    };

    let key = match (&document_type, caps.document_type_in_key) {
        (Some(doc), true) => format!("{}/{}", base_key, columns::normalize_key(doc)),
        _ => base_key,
    };

    let expiration_date = cell(columns::EXPIRATION_DATE).and_then(|raw| {
        let parsed = dates::parse_date(&raw);
        if parsed.is_none() {
            stats.unparsable_dates += 1;
            debug!("{}: key {} has unparsable date {:?}", spec.source_name, key, raw);
        }
        parsed
    });

    let last_notified_at = if spec.read_last_notified {
        cell(columns::LAST_NOTIFIED_AT).and_then(|raw| {
            let parsed = dates::parse_timestamp(&raw);
            if parsed.is_none() {
                stats.unparsable_timestamps += 1;
            }
            parsed
        })
    } else {
        None
    };

    let gated = |enabled: bool, name: &str| if enabled { cell(name) } else { None };

    Some(VehicleRecord {
        document_type: if caps.document_type { document_type } else { None },
        expiration_date,
        driver: gated(caps.driver, columns::DRIVER),
        plate: gated(caps.plate, columns::PLATE),
        company: gated(caps.company, columns::COMPANY),
        phone: gated(caps.phone, columns::PHONE),
        last_notified_at,
        key,
    })
}
