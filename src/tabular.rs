//! Spreadsheet snapshot I/O
//!
//! Both sources arrive as CSV exports of the master and ERP sheets. Loading
//! yields raw string rows for the normalizer; saving rewrites the whole
//! registry through a temp file in the target directory that is then
//! persisted over the destination, so a failed save never leaves a
//! half-written master file.
//!
//! Cells are read as UTF-8. Older ERP exports are Windows-1252; any cell
//! that is not valid UTF-8 is decoded as Windows-1252 instead, and the run
//! logs how many cells needed it.

use std::path::Path;

use anyhow::{Context, Result};
use fleet_types::{FieldCapabilities, VehicleRecord};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::normalizer::columns;
use crate::normalizer::{RawRow, RawTable};

/// Decode one cell, counting the ones that were not UTF-8
fn decode_cell(bytes: &[u8], legacy_cells: &mut usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            *legacy_cells += 1;
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

/// Load a CSV snapshot. Short rows simply lack the trailing cells.
pub fn load_table(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open snapshot: {}", path.display()))?;

    let mut legacy_cells = 0;
    let headers: Vec<String> = reader
        .byte_headers()
        .with_context(|| format!("Failed to read header row: {}", path.display()))?
        .iter()
        .map(|h| decode_cell(h, &mut legacy_cells))
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.byte_records().enumerate() {
        let record = result
            .with_context(|| format!("Failed to read row {} of {}", idx + 1, path.display()))?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), decode_cell(v, &mut legacy_cells)))
            .collect();
        rows.push(row);
    }

    if legacy_cells > 0 {
        warn!(
            "{}: {} cells were not UTF-8, read as Windows-1252",
            path.display(),
            legacy_cells
        );
    }
    debug!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(RawTable::new(headers, rows))
}

/// Columns written for a given capability set
pub fn registry_columns(capabilities: &FieldCapabilities) -> Vec<&'static str> {
    columns::REGISTRY_COLUMNS
        .iter()
        .copied()
        .filter(|col| match *col {
            columns::PLATE => capabilities.plate,
            columns::DOCUMENT_TYPE => {
                capabilities.document_type || capabilities.document_type_in_key
            }
            columns::DRIVER => capabilities.driver,
            columns::COMPANY => capabilities.company,
            columns::PHONE => capabilities.phone,
            _ => true,
        })
        .collect()
}

/// Vehicle identifier as it goes back into the sheet: the key without any
/// `/DOCTYPE` suffix the normalizer appended
fn vehicle_cell(record: &VehicleRecord, capabilities: &FieldCapabilities) -> String {
    if capabilities.document_type_in_key {
        if let Some(doc) = &record.document_type {
            let suffix = format!("/{}", columns::normalize_key(doc));
            if let Some(vehicle) = record.key.strip_suffix(&suffix) {
                return vehicle.to_string();
            }
        }
    }
    record.key.clone()
}

fn cell(record: &VehicleRecord, column: &str, capabilities: &FieldCapabilities) -> String {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    match column {
        columns::VEHICLE => vehicle_cell(record, capabilities),
        columns::PLATE => text(&record.plate),
        columns::DOCUMENT_TYPE => text(&record.document_type),
        columns::EXPIRATION_DATE => record
            .expiration_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        columns::DRIVER => text(&record.driver),
        columns::COMPANY => text(&record.company),
        columns::PHONE => text(&record.phone),
        columns::LAST_NOTIFIED_AT => record
            .last_notified_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Overwrite `path` with the full registry (temp file + persist)
pub fn save_registry(
    path: &Path,
    records: &[VehicleRecord],
    capabilities: &FieldCapabilities,
) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

    let header = registry_columns(capabilities);
    {
        let mut writer = csv::Writer::from_writer(&mut tmp);
        writer.write_record(&header)?;
        for record in records {
            writer.write_record(header.iter().map(|col| cell(record, col, capabilities)))?;
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace registry: {}", path.display()))?;

    info!("Saved {} records to {}", records.len(), path.display());
    Ok(())
}
