use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

const REQUIRED_COLUMNS: [&str; 3] = ["state", "city", "count"];

/// One input row after header normalization. Cell values are preserved
/// as-is; only column labels are canonicalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRow {
    pub state: String,
    pub city: String,
    pub count: f64,
}

pub fn read_rows(path: &Path) -> AppResult<Vec<AssetRow>> {
    let file = File::open(path)?;
    parse_rows(file)
}

/// Parse a single-sheet tabular input. Fails with a schema error when any
/// of the required columns is absent (case-insensitively) or a count cell
/// is not a non-negative number; no rows are processed on failure.
pub fn parse_rows<R: Read>(input: R) -> AppResult<Vec<AssetRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|err| AppError::Schema(format!("unreadable header row: {err}")))?;
    let normalized: Vec<String> = headers.iter().map(|label| label.to_lowercase()).collect();
    let columns = locate_columns(&normalized)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        rows.push(extract_row(&record, &columns, index)?);
    }
    Ok(rows)
}

struct ColumnIndexes {
    state: usize,
    city: usize,
    count: usize,
}

fn locate_columns(normalized: &[String]) -> AppResult<ColumnIndexes> {
    let find = |name: &str| normalized.iter().position(|label| label.as_str() == name);

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| find(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Schema(format!(
            "input file must have columns: state, city, count (missing: {})",
            missing.join(", ")
        )));
    }

    Ok(ColumnIndexes {
        state: find("state").unwrap_or_default(),
        city: find("city").unwrap_or_default(),
        count: find("count").unwrap_or_default(),
    })
}

fn extract_row(
    record: &csv::StringRecord,
    columns: &ColumnIndexes,
    index: usize,
) -> AppResult<AssetRow> {
    let cell = |position: usize| record.get(position).unwrap_or_default().to_string();

    let raw_count = cell(columns.count);
    let count: f64 = raw_count.trim().parse().map_err(|_| {
        AppError::Schema(format!("row {}: count '{raw_count}' is not numeric", index + 1))
    })?;
    if !count.is_finite() || count < 0.0 {
        return Err(AppError::Schema(format!(
            "row {}: count '{raw_count}' must be non-negative",
            index + 1
        )));
    }

    Ok(AssetRow {
        state: cell(columns.state),
        city: cell(columns.city),
        count,
    })
}
