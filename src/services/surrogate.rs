use nalgebra::{DMatrix, DVector, SVD};

use crate::domain::constants::SURROGATE_FEATURES;
use crate::domain::errors::StudyError;
use crate::domain::models::{PredictReport, PredictionRow, Surrogate};
use crate::services::estimate::{period_years, DEFAULT_RISK};
use crate::services::stats;
use crate::trace::{FlatRow, FlatValue};

pub const PREDICTION_HEADER: [&str; 4] = ["ts", "name", "actual", "predicted"];

const N_FEATURES: usize = SURROGATE_FEATURES.len();

/// One `estimated_points.csv` row that has an actual score.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub ts: String,
    pub name: String,
    pub actual: f64,
    pub features: [f64; N_FEATURES],
}

fn cell<'a>(row: &'a FlatRow, key: &str) -> &'a FlatValue {
    row.get(key).unwrap_or(&FlatValue::Null)
}

fn number_or_zero(row: &FlatRow, key: &str) -> f64 {
    cell(row, key).as_f64().unwrap_or(0.0)
}

fn cell_text(row: &FlatRow, key: &str) -> String {
    cell(row, key).to_string()
}

fn is_missing(value: &FlatValue) -> bool {
    match value {
        FlatValue::Null => true,
        FlatValue::Text(s) => {
            let s = s.trim();
            s.is_empty() || s.eq_ignore_ascii_case("none") || s == "null"
        }
        _ => false,
    }
}

/// Both years, or neither when either one is malformed.
fn years(row: &FlatRow) -> (Option<i64>, Option<i64>) {
    let parse = |v: &FlatValue| -> Result<Option<i64>, ()> {
        if is_missing(v) {
            return Ok(None);
        }
        match v {
            FlatValue::Int(i) => Ok(Some(*i)),
            FlatValue::Text(s) => s.trim().parse().map(Some).map_err(|_| ()),
            _ => Err(()),
        }
    };
    match (
        parse(cell(row, "start_year")),
        parse(cell(row, "end_year")),
    ) {
        (Ok(s), Ok(e)) => (s, e),
        _ => (None, None),
    }
}

impl TrainingRow {
    /// `None` when the row has no usable actual score.
    pub fn from_row(row: &FlatRow) -> Option<Self> {
        let actual_cell = cell(row, "actual_points");
        if is_missing(actual_cell) {
            return None;
        }
        let actual = actual_cell.as_f64()?;

        let budget = number_or_zero(row, "budget");
        let (start, end) = years(row);
        let risk = match cell(row, "risk_tolerance") {
            FlatValue::Text(s) if !s.is_empty() => s.clone(),
            _ => DEFAULT_RISK.to_string(),
        };
        let one_hot = |name: &str| if risk == name { 1.0 } else { 0.0 };

        Some(Self {
            ts: cell_text(row, "ts"),
            name: cell_text(row, "name"),
            actual,
            features: [
                budget.max(0.0).ln_1p(),
                number_or_zero(row, "eligible_count"),
                period_years(start, end),
                number_or_zero(row, "avg_volatility"),
                number_or_zero(row, "avg_log_marketcap"),
                number_or_zero(row, "avg_points_score"),
                number_or_zero(row, "portfolio_size"),
                one_hot("Conservative"),
                one_hot("Moderate"),
                one_hot("Aggressive"),
            ],
        })
    }
}

pub fn training_rows(rows: &[FlatRow]) -> Vec<TrainingRow> {
    rows.iter().filter_map(TrainingRow::from_row).collect()
}

/// Ordinary least squares with an intercept. Rank-deficient designs get
/// the minimum-norm coefficient vector.
pub fn fit(rows: &[TrainingRow]) -> anyhow::Result<Surrogate> {
    if rows.is_empty() {
        return Err(StudyError::NotEnoughRows {
            needed: 1,
            found: 0,
        }
        .into());
    }
    let n = rows.len();
    let x = DMatrix::from_fn(n, N_FEATURES, |i, j| rows[i].features[j]);
    let y = DVector::from_iterator(n, rows.iter().map(|r| r.actual));

    let x_mean: Vec<f64> = (0..N_FEATURES).map(|j| x.column(j).mean()).collect();
    let y_mean = y.mean();
    let xc = DMatrix::from_fn(n, N_FEATURES, |i, j| x[(i, j)] - x_mean[j]);
    let yc = y.map(|v| v - y_mean);

    let svd = SVD::new(xc, true, true);
    let max_sv = svd.singular_values.max();
    let eps = max_sv * (n.max(N_FEATURES) as f64) * f64::EPSILON;
    let beta = svd
        .solve(&yc, eps)
        .map_err(|e| anyhow::anyhow!("least squares solve failed: {e}"))?;

    let coefficients: Vec<f64> = beta.iter().copied().collect();
    let intercept = y_mean
        - coefficients
            .iter()
            .zip(&x_mean)
            .map(|(b, m)| b * m)
            .sum::<f64>();
    tracing::debug!(rows = n, intercept, "fitted linear surrogate");

    Ok(Surrogate {
        intercept,
        coefficients,
        feature_names: SURROGATE_FEATURES.iter().map(|s| s.to_string()).collect(),
    })
}

impl Surrogate {
    pub fn validate(&self) -> Result<(), StudyError> {
        if self.coefficients.len() != N_FEATURES {
            return Err(StudyError::InvalidModel(format!(
                "expected {} coefficients, found {}",
                N_FEATURES,
                self.coefficients.len()
            )));
        }
        if self.feature_names.iter().map(String::as_str).ne(SURROGATE_FEATURES) {
            return Err(StudyError::InvalidModel(format!(
                "feature names must be {}",
                SURROGATE_FEATURES.join(",")
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(StudyError::InvalidModel("non-finite parameters".into()));
        }
        Ok(())
    }

    pub fn predict(&self, features: &[f64; N_FEATURES]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

pub fn predict_rows(model: &Surrogate, rows: &[TrainingRow]) -> Vec<PredictionRow> {
    rows.iter()
        .map(|r| PredictionRow {
            ts: r.ts.clone(),
            name: r.name.clone(),
            actual: r.actual,
            predicted: model.predict(&r.features),
        })
        .collect()
}

pub fn score(out: &str, predictions: &[PredictionRow]) -> PredictReport {
    let actual: Vec<f64> = predictions.iter().map(|p| p.actual).collect();
    let predicted: Vec<f64> = predictions.iter().map(|p| p.predicted).collect();
    PredictReport {
        out: out.to_string(),
        rows: predictions.len(),
        pearson_r: stats::pearson(&actual, &predicted, 2),
        r2: stats::r2_score(&actual, &predicted),
        mae: stats::mae(&actual, &predicted),
    }
}
