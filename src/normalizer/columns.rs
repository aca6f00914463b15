//! Canonical column names and header aliasing
//!
//! Source spreadsheets disagree on header spelling (Spanish ERP headers, a
//! truncated `FECHA DE VENCIN`, stray whitespace). Headers are normalized
//! first, then mapped through the alias table onto these canonical names.

use std::collections::BTreeMap;

pub const VEHICLE: &str = "VEHICLE";
pub const PLATE: &str = "PLATE";
pub const DOCUMENT_TYPE: &str = "DOCUMENT_TYPE";
pub const EXPIRATION_DATE: &str = "EXPIRATION_DATE";
pub const DRIVER: &str = "DRIVER";
pub const COMPANY: &str = "COMPANY";
pub const PHONE: &str = "PHONE";
pub const LAST_NOTIFIED_AT: &str = "LAST_NOTIFIED_AT";

/// Column order used when the registry is written back out
pub const REGISTRY_COLUMNS: [&str; 8] = [
    VEHICLE,
    PLATE,
    DOCUMENT_TYPE,
    EXPIRATION_DATE,
    DRIVER,
    COMPANY,
    PHONE,
    LAST_NOTIFIED_AT,
];

/// Trim, upper-case and collapse inner whitespace runs to one space
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Resolve a raw header to its canonical name (unknown headers pass through)
pub fn canonical_header(raw: &str, aliases: &BTreeMap<String, String>) -> String {
    let header = normalize_header(raw);
    match aliases.get(&header) {
        Some(canonical) => normalize_header(canonical),
        None => header,
    }
}

/// Key form of a vehicle identifier: upper-case with all whitespace removed
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Built-in alias table for the master sheet and the ERP export
pub fn default_aliases() -> BTreeMap<String, String> {
    [
        ("VEHICULO", VEHICLE),
        ("VEHÍCULO", VEHICLE),
        ("MATRICULA", PLATE),
        ("MATRÍCULA", PLATE),
        ("FECHA DE VENCIN", EXPIRATION_DATE),
        ("FECHA DE VENCIMIENTO", EXPIRATION_DATE),
        ("VENCIMIENTO", EXPIRATION_DATE),
        ("EXPIRATION", EXPIRATION_DATE),
        ("EXPIRATION DATE", EXPIRATION_DATE),
        ("DOCUMENTO", DOCUMENT_TYPE),
        ("TIPO DOCUMENTO", DOCUMENT_TYPE),
        ("DOCUMENT TYPE", DOCUMENT_TYPE),
        ("CONDUCTOR", DRIVER),
        ("EMPRESA", COMPANY),
        ("TELEFONO", PHONE),
        ("TELÉFONO", PHONE),
        ("ULTIMO AVISO", LAST_NOTIFIED_AT),
        ("ÚLTIMO AVISO", LAST_NOTIFIED_AT),
        ("LAST NOTIFIED AT", LAST_NOTIFIED_AT),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
