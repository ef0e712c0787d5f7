use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub ok: bool,
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct FlattenReport {
    pub out: String,
    pub records: usize,
    pub rows: usize,
    pub dropped: usize,
    pub columns: usize,
}

#[derive(Serialize, Debug, Default, PartialEq)]
pub struct LabelSummary {
    pub records: usize,
    pub labeled: usize,
    pub explicit: usize,
    pub budget_breach: usize,
    pub error: usize,
    pub dropped: usize,
    pub non_numeric_points: usize,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Categorical,
    Numeric,
}

/// One line of `correlations.csv`.
#[derive(Serialize, Debug, Clone)]
pub struct CorrelationRow {
    pub feature: String,
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub n: usize,
    pub correlation: Option<f64>,
    pub notes: String,
    pub abs_corr: Option<f64>,
    #[serde(skip)]
    pub delta: Option<f64>,
}

#[derive(Serialize)]
pub struct RankedFeature {
    pub feature: String,
    pub correlation: f64,
    pub n: usize,
}

#[derive(Serialize)]
pub struct CategoricalEffect {
    pub feature: String,
    pub n: usize,
    pub notes: String,
}

#[derive(Serialize)]
pub struct StudyReport {
    pub out: String,
    pub rows: usize,
    pub features: usize,
    pub top_positive: Vec<RankedFeature>,
    pub top_negative: Vec<RankedFeature>,
    pub top_categorical: Vec<CategoricalEffect>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ImportanceRow {
    pub feature: String,
    pub importance: Option<f64>,
}

#[derive(Serialize)]
pub struct ImportanceReport {
    pub out: String,
    pub target: String,
    pub method: String,
    pub rows: usize,
    pub features: Vec<ImportanceRow>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct IntervalRow {
    pub interval_index: usize,
    pub start_comment_event_idx: usize,
    pub end_comment_event_idx: usize,
    pub interval_mean: f64,
    pub n_records: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CommentAverage {
    pub comment: String,
    pub mean: Option<f64>,
}

#[derive(Serialize, Debug)]
pub struct IntervalsReport {
    pub input: String,
    pub records: usize,
    pub overall_mean: Option<f64>,
    pub mean_following_comments: Option<f64>,
    pub following_count: usize,
    pub mean_between_comments: Option<f64>,
    pub interval_count: usize,
    pub comments: Vec<CommentAverage>,
}

/// One line of `estimated_points.csv`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EstimateRow {
    pub ts: String,
    pub name: String,
    pub budget: f64,
    pub eligible_count: f64,
    pub start_year: Option<i64>,
    pub end_year: Option<i64>,
    pub risk_tolerance: String,
    pub expected_points: f64,
    pub actual_points: Option<f64>,
    pub skipped: bool,
    pub avg_volatility: f64,
    pub avg_log_marketcap: f64,
    pub avg_points_score: f64,
    pub portfolio_size: usize,
}

#[derive(Serialize)]
pub struct EstimateReport {
    pub out: String,
    pub rows: usize,
    pub with_actual: usize,
    pub expected_mean: Option<f64>,
    pub expected_std: Option<f64>,
    pub actual_mean: Option<f64>,
    pub actual_std: Option<f64>,
    pub correlation: Option<f64>,
}

/// Linear surrogate persisted by `fit` and applied by `predict`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Surrogate {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub feature_names: Vec<String>,
}

#[derive(Serialize)]
pub struct FitReport {
    pub out: String,
    pub rows: usize,
    pub model: Surrogate,
}

/// One line of `predicted_points.csv`.
#[derive(Serialize, Debug, Clone)]
pub struct PredictionRow {
    pub ts: String,
    pub name: String,
    pub actual: f64,
    pub predicted: f64,
}

#[derive(Serialize)]
pub struct PredictReport {
    pub out: String,
    pub rows: usize,
    pub pearson_r: Option<f64>,
    pub r2: f64,
    pub mae: f64,
}

/// One line of `threshold_summary.csv`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ThresholdRow {
    pub threshold: f64,
    pub skip_fraction: f64,
    pub kept_count: usize,
    pub skipped_count: usize,
    pub total_actual_kept: f64,
    pub mean_actual_kept: f64,
    pub total_actual_skipped: f64,
    pub mean_actual_skipped: Option<f64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ThresholdSuggestion {
    pub threshold: f64,
    pub mean_actual_kept: f64,
    pub skip_fraction: f64,
}

#[derive(Serialize)]
pub struct ThresholdReport {
    pub out: String,
    pub predictions: usize,
    pub thresholds: usize,
    pub keep_target: f64,
    pub best_mean_kept: Option<ThresholdSuggestion>,
    pub closest_keep: Option<ThresholdSuggestion>,
}
