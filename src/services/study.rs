use indexmap::{IndexMap, IndexSet};
use std::cmp::Ordering;

use crate::domain::constants::POINTS_COLUMN;
use crate::domain::models::{
    CategoricalEffect, CorrelationRow, FeatureKind, RankedFeature, StudyReport,
};
use crate::services::stats;
use crate::trace::{FlatRow, FlatValue};

/// CSV header of `correlations.csv`.
pub const CORRELATION_HEADER: [&str; 6] = ["feature", "type", "n", "correlation", "notes", "abs_corr"];

/// Rows whose label is numeric, paired with that label.
pub fn numeric_targets(rows: &[FlatRow]) -> Vec<(&FlatRow, f64)> {
    rows.iter()
        .filter_map(|r| r.get(POINTS_COLUMN).and_then(FlatValue::as_f64).map(|y| (r, y)))
        .collect()
}

/// Sort key placing `None` after every number.
fn desc_nan_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn numeric_row(feature: &str, labeled: &[(&FlatRow, f64)], min_pairs: usize) -> CorrelationRow {
    let (xs, ys): (Vec<f64>, Vec<f64>) = labeled
        .iter()
        .filter_map(|(r, y)| r.get(feature).and_then(FlatValue::as_f64).map(|x| (x, *y)))
        .unzip();
    let correlation = stats::pearson(&xs, &ys, min_pairs);
    CorrelationRow {
        feature: feature.to_string(),
        kind: FeatureKind::Numeric,
        n: xs.len(),
        correlation,
        notes: String::new(),
        abs_corr: correlation.map(f64::abs),
        delta: None,
    }
}

fn categorical_row(
    feature: &str,
    labeled: &[(&FlatRow, f64)],
    overall_mean: f64,
) -> Option<CorrelationRow> {
    let mut groups: IndexMap<String, (usize, f64)> = IndexMap::new();
    for (row, y) in labeled {
        match row.get(feature) {
            None | Some(FlatValue::Null) => continue,
            Some(v) => {
                let g = groups.entry(v.to_string()).or_default();
                g.0 += 1;
                g.1 += y;
            }
        }
    }

    let n: usize = groups.values().map(|(c, _)| c).sum();
    let (best_cat, best_mean) = groups
        .iter()
        .map(|(cat, (count, sum))| (cat, *sum / *count as f64, *count))
        .reduce(|best, cand| {
            let better = cand.1 > best.1 || (cand.1 == best.1 && cand.2 > best.2);
            if better {
                cand
            } else {
                best
            }
        })
        .map(|(cat, m, _)| (cat.clone(), m))?;

    let delta = best_mean - overall_mean;
    Some(CorrelationRow {
        feature: feature.to_string(),
        kind: FeatureKind::Categorical,
        n,
        correlation: None,
        notes: format!("best_cat={best_cat}; best_mean={best_mean:.4}; delta={delta:.4}"),
        abs_corr: None,
        delta: Some(delta),
    })
}

/// One correlation row per feature column, sorted by type then by
/// absolute correlation (undefined last).
pub fn correlate(rows: &[FlatRow], min_pairs: usize) -> Vec<CorrelationRow> {
    let labeled = numeric_targets(rows);
    let targets: Vec<f64> = labeled.iter().map(|(_, y)| *y).collect();
    let Some(overall_mean) = stats::mean(&targets) else {
        return Vec::new();
    };

    let features: IndexSet<&str> = labeled
        .iter()
        .flat_map(|(r, _)| r.keys().map(String::as_str))
        .filter(|k| *k != POINTS_COLUMN)
        .collect();

    let mut out = Vec::new();
    for feature in features {
        let values: Vec<&FlatValue> = labeled
            .iter()
            .filter_map(|(r, _)| r.get(feature))
            .filter(|v| !matches!(v, FlatValue::Null))
            .collect();
        if values.is_empty() {
            continue;
        }
        if values.iter().any(|v| v.as_f64().is_some()) {
            out.push(numeric_row(feature, &labeled, min_pairs));
        } else if let Some(row) = categorical_row(feature, &labeled, overall_mean) {
            out.push(row);
        }
    }

    out.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| desc_nan_last(a.abs_corr, b.abs_corr))
    });
    out
}

/// Headline lists printed after a study run.
pub fn summarize(out: &str, rows: usize, correlations: &[CorrelationRow], top: usize) -> StudyReport {
    let mut numeric: Vec<&CorrelationRow> = correlations
        .iter()
        .filter(|c| c.kind == FeatureKind::Numeric && c.correlation.is_some())
        .collect();
    numeric.sort_by(|a, b| desc_nan_last(a.correlation, b.correlation));
    let ranked = |c: &&CorrelationRow| RankedFeature {
        feature: c.feature.clone(),
        correlation: c.correlation.unwrap_or_default(),
        n: c.n,
    };
    let top_positive = numeric.iter().take(top).map(ranked).collect();
    let top_negative = numeric.iter().rev().take(top).map(ranked).collect();

    let mut categorical: Vec<&CorrelationRow> = correlations
        .iter()
        .filter(|c| c.kind == FeatureKind::Categorical)
        .collect();
    categorical.sort_by(|a, b| desc_nan_last(a.delta, b.delta));
    let top_categorical = categorical
        .iter()
        .take(top)
        .map(|c| CategoricalEffect {
            feature: c.feature.clone(),
            n: c.n,
            notes: c.notes.clone(),
        })
        .collect();

    StudyReport {
        out: out.to_string(),
        rows,
        features: correlations.len(),
        top_positive,
        top_negative,
        top_categorical,
    }
}
