use std::cmp::Ordering;
use std::path::Path;

use crate::domain::constants::TARGET_CANDIDATES;
use crate::domain::errors::StudyError;
use crate::domain::models::ImportanceRow;
use crate::services::records::RecordSource;
use crate::services::{stats, storage};
use crate::trace::{labeled_row, FlatRow, FlatValue};

pub const IMPORTANCE_HEADER: [&str; 2] = ["feature", "importance"];
pub const METHOD: &str = "abs_pearson";

/// A loaded analysis table: column order plus rows.
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<FlatRow>,
}

/// CSV input is read as-is; anything else is treated as a trace and
/// flattened into labeled rows.
pub fn load_table(path: &Path) -> anyhow::Result<Table> {
    let is_csv = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        let (columns, rows) = storage::read_table(path)?;
        return Ok(Table { columns, rows });
    }

    let source = RecordSource::open(&[path.to_path_buf()])?;
    let mut rows = Vec::new();
    for record in source.records() {
        if let Some(row) = labeled_row(&record?) {
            rows.push(row);
        }
    }
    if rows.is_empty() {
        return Err(StudyError::NoRecords(path.display().to_string()).into());
    }
    let mut columns: Vec<String> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    Ok(Table { columns, rows })
}

/// Known label columns first, then any column mentioning "point".
pub fn find_target(columns: &[String]) -> Option<&str> {
    TARGET_CANDIDATES
        .iter()
        .find_map(|c| columns.iter().find(|col| col.as_str() == *c))
        .or_else(|| {
            columns
                .iter()
                .find(|c| c.to_lowercase().contains("point"))
        })
        .map(String::as_str)
}

/// Every present value is an integer or float, and at least one exists.
fn is_numeric_column(rows: &[FlatRow], column: &str) -> bool {
    let mut seen = false;
    for v in rows.iter().filter_map(|r| r.get(column)) {
        match v {
            FlatValue::Null => {}
            FlatValue::Int(_) | FlatValue::Float(_) => seen = true,
            FlatValue::Text(_) => return false,
        }
    }
    seen
}

/// |Pearson| of each numeric column against `target`, strongest first.
pub fn rank_features(table: &Table, target: &str) -> Result<Vec<ImportanceRow>, StudyError> {
    let labeled: Vec<(&FlatRow, f64)> = table
        .rows
        .iter()
        .filter_map(|r| r.get(target).and_then(FlatValue::as_f64).map(|y| (r, y)))
        .collect();

    let features: Vec<&String> = table
        .columns
        .iter()
        .filter(|c| c.as_str() != target && is_numeric_column(&table.rows, c))
        .collect();
    if features.is_empty() {
        return Err(StudyError::NoFeatures(target.to_string()));
    }

    let mut ranked: Vec<ImportanceRow> = features
        .into_iter()
        .map(|feature| {
            let (xs, ys): (Vec<f64>, Vec<f64>) = labeled
                .iter()
                .filter_map(|(r, y)| r.get(feature).and_then(FlatValue::as_f64).map(|x| (x, *y)))
                .unzip();
            ImportanceRow {
                feature: feature.clone(),
                importance: stats::pearson(&xs, &ys, 2).map(f64::abs),
            }
        })
        .collect();

    ranked.sort_by(|a, b| match (a.importance, b.importance) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    Ok(ranked)
}
