use crate::domain::errors::StudyError;
use crate::domain::models::{ThresholdRow, ThresholdSuggestion};
use crate::services::stats;
use crate::trace::{FlatRow, FlatValue};

pub const THRESHOLD_HEADER: [&str; 8] = [
    "threshold",
    "skip_fraction",
    "kept_count",
    "skipped_count",
    "total_actual_kept",
    "mean_actual_kept",
    "total_actual_skipped",
    "mean_actual_skipped",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub actual: f64,
    pub predicted: f64,
}

/// Rows with numeric `actual` and `predicted`; others are ignored.
pub fn predictions(rows: &[FlatRow]) -> Vec<Prediction> {
    rows.iter()
        .filter_map(|r| {
            Some(Prediction {
                actual: r.get("actual").and_then(FlatValue::as_f64)?,
                predicted: r.get("predicted").and_then(FlatValue::as_f64)?,
            })
        })
        .collect()
}

/// Candidate cutoffs spanning the prediction range plus `margin`.
pub fn thresholds(preds: &[Prediction], steps: usize, margin: f64) -> Vec<f64> {
    let lo = preds.iter().map(|p| p.predicted).fold(f64::INFINITY, f64::min);
    let hi = preds
        .iter()
        .map(|p| p.predicted)
        .fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return Vec::new();
    }
    stats::linspace(lo.floor() - margin, hi.ceil() + margin, steps)
}

/// Requests predicted at or above `threshold` are kept.
pub fn evaluate(preds: &[Prediction], threshold: f64) -> ThresholdRow {
    let (kept, skipped): (Vec<&Prediction>, Vec<&Prediction>) =
        preds.iter().partition(|p| p.predicted >= threshold);
    let kept_actual: Vec<f64> = kept.iter().map(|p| p.actual).collect();
    let skipped_actual: Vec<f64> = skipped.iter().map(|p| p.actual).collect();
    ThresholdRow {
        threshold,
        skip_fraction: skipped.len() as f64 / preds.len().max(1) as f64,
        kept_count: kept.len(),
        skipped_count: skipped.len(),
        total_actual_kept: kept_actual.iter().sum(),
        mean_actual_kept: stats::mean(&kept_actual).unwrap_or(0.0),
        total_actual_skipped: skipped_actual.iter().sum(),
        mean_actual_skipped: stats::mean(&skipped_actual),
    }
}

pub fn sweep(preds: &[Prediction], steps: usize, margin: f64) -> Result<Vec<ThresholdRow>, StudyError> {
    if preds.is_empty() {
        return Err(StudyError::NotEnoughRows {
            needed: 1,
            found: 0,
        });
    }
    Ok(thresholds(preds, steps, margin)
        .into_iter()
        .map(|t| evaluate(preds, t))
        .collect())
}

fn suggestion(row: &ThresholdRow) -> ThresholdSuggestion {
    ThresholdSuggestion {
        threshold: row.threshold,
        mean_actual_kept: row.mean_actual_kept,
        skip_fraction: row.skip_fraction,
    }
}

/// Highest mean score per kept request; earliest threshold on ties.
pub fn best_mean_kept(rows: &[ThresholdRow]) -> Option<ThresholdSuggestion> {
    rows.iter()
        .filter(|r| r.kept_count > 0)
        .fold(None::<&ThresholdRow>, |best, r| match best {
            Some(b) if b.mean_actual_kept >= r.mean_actual_kept => Some(b),
            _ => Some(r),
        })
        .map(suggestion)
}

/// Keep fraction closest to `keep_target`; earliest threshold on ties.
pub fn closest_keep(rows: &[ThresholdRow], keep_target: f64) -> Option<ThresholdSuggestion> {
    let gap = |r: &ThresholdRow| (1.0 - r.skip_fraction - keep_target).abs();
    rows.iter()
        .fold(None::<&ThresholdRow>, |best, r| match best {
            Some(b) if gap(b) <= gap(r) => Some(b),
            _ => Some(r),
        })
        .map(suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preds(pairs: &[(f64, f64)]) -> Vec<Prediction> {
        pairs
            .iter()
            .map(|&(actual, predicted)| Prediction { actual, predicted })
            .collect()
    }

    #[test]
    fn thresholds_span_floor_and_ceil_with_margin() {
        let p = preds(&[(0.0, 1.5), (0.0, 8.2)]);
        let t = thresholds(&p, 50, 10.0);
        assert_eq!(t.len(), 50);
        assert_eq!(t[0], -9.0);
        assert_eq!(t[49], 19.0);
    }

    #[test]
    fn evaluate_splits_on_prediction() {
        let p = preds(&[(10.0, 1.0), (20.0, 2.0), (40.0, 3.0)]);
        let row = evaluate(&p, 2.0);
        assert_eq!(row.kept_count, 2);
        assert_eq!(row.skipped_count, 1);
        assert_eq!(row.total_actual_kept, 60.0);
        assert_eq!(row.mean_actual_kept, 30.0);
        assert_eq!(row.mean_actual_skipped, Some(10.0));
        assert!((row.skip_fraction - 1.0 / 3.0).abs() < 1e-12);

        let none_kept = evaluate(&p, 100.0);
        assert_eq!(none_kept.mean_actual_kept, 0.0);
        assert_eq!(none_kept.total_actual_kept, 0.0);
        let none_skipped = evaluate(&p, -100.0);
        assert_eq!(none_skipped.mean_actual_skipped, None);
    }

    #[test]
    fn suggestions_pick_best_mean_and_closest_keep() {
        let p = preds(&[(10.0, 1.0), (20.0, 2.0), (40.0, 3.0), (-5.0, 4.0)]);
        let rows: Vec<ThresholdRow> = [0.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|t| evaluate(&p, *t))
            .collect();
        let best = best_mean_kept(&rows).unwrap();
        // kept {2, 3, 4} -> 55 / 3 beats kept {3, 4} -> 35 / 2
        assert_eq!(best.threshold, 2.0);
        let closest = closest_keep(&rows, 0.5).unwrap();
        assert_eq!(closest.threshold, 3.0);
    }

    #[test]
    fn empty_predictions_are_rejected() {
        assert_eq!(sweep(&[], 50, 10.0).unwrap_err().code(), "NOT_ENOUGH_ROWS");
    }

    #[test]
    fn non_numeric_rows_are_ignored() {
        let rows: Vec<FlatRow> = vec![
            [
                ("actual".to_string(), FlatValue::Int(1)),
                ("predicted".to_string(), FlatValue::Float(0.5)),
            ]
            .into_iter()
            .collect(),
            [("actual".to_string(), FlatValue::Text("x".into()))]
                .into_iter()
                .collect(),
        ];
        assert_eq!(
            predictions(&rows),
            vec![Prediction {
                actual: 1.0,
                predicted: 0.5
            }]
        );
    }
}
