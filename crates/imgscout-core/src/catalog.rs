use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::AppError;
use crate::models::Target;

/// Field holding each entity's canonical address.
pub const DEFAULT_URL_FIELD: &str = "canonical_url";

/// Read the catalog and collect its unique targets.
///
/// The catalog is a JSON array of records. Records whose `url_field` is
/// missing, empty, or not a string are skipped.
pub fn load_targets(path: &Path, url_field: &str) -> Result<HashSet<Target>, AppError> {
    let raw = fs::read_to_string(path).map_err(|e| AppError::CatalogError {
        path: path.to_path_buf(),
        message: format!("cannot read catalog: {e}"),
    })?;

    let doc: serde_json::Value = serde_json::from_str(&raw).map_err(|e| AppError::CatalogError {
        path: path.to_path_buf(),
        message: format!("invalid JSON: {e}"),
    })?;

    let records = doc.as_array().ok_or_else(|| AppError::CatalogError {
        path: path.to_path_buf(),
        message: "expected a JSON array of records".into(),
    })?;

    Ok(targets_from_records(records, url_field))
}

fn targets_from_records(records: &[serde_json::Value], url_field: &str) -> HashSet<Target> {
    records
        .iter()
        .filter_map(|record| record.get(url_field)?.as_str())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}
