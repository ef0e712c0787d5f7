use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tracestudy",
    version,
    about = "Offline analysis of evaluator traces"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Config file (defaults to ./tracestudy.toml when present)"
    )]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Flatten and label traces, adding portfolio features
    Flatten {
        files: Vec<PathBuf>,
        #[arg(long, default_value = "study_augmented.csv")]
        out: PathBuf,
    },
    /// Correlate every flattened feature with points
    Study {
        files: Vec<PathBuf>,
        #[arg(long, default_value = "correlations.csv")]
        out: PathBuf,
        #[arg(long, help = "How many top features to report")]
        top: Option<usize>,
    },
    /// Rank numeric features by absolute correlation with the target
    Importance {
        #[arg(long = "in", default_value = "study_augmented.csv")]
        input: PathBuf,
        #[arg(long, default_value = "feature_importances.csv")]
        out: PathBuf,
        #[arg(long)]
        top: Option<usize>,
    },
    /// Count records by points provenance
    Labels { files: Vec<PathBuf> },
    /// Average points around comment events in a trace
    Intervals {
        #[arg(long = "in", default_value = "request_trace.jsonl")]
        input: PathBuf,
        #[arg(long, help = "Optional CSV of interval means")]
        out: Option<PathBuf>,
        #[arg(long, help = "Optional text file of per-comment averages")]
        comments_out: Option<PathBuf>,
    },
    /// Heuristic expected points per trace entry
    Estimate {
        #[arg(long = "in", default_value = "request_trace.jsonl")]
        input: PathBuf,
        #[arg(long, default_value = "estimated_points.csv")]
        out: PathBuf,
        #[arg(long)]
        stocks_cache: Option<PathBuf>,
        #[arg(long)]
        points_store: Option<PathBuf>,
    },
    /// Fit the linear surrogate on estimated points
    Fit {
        #[arg(long = "in", default_value = "estimated_points.csv")]
        input: PathBuf,
        #[arg(long, default_value = "linear_surrogate.json")]
        out: PathBuf,
    },
    /// Apply the linear surrogate and score it
    Predict {
        #[arg(long = "in", default_value = "estimated_points.csv")]
        input: PathBuf,
        #[arg(long, default_value = "linear_surrogate.json")]
        model: PathBuf,
        #[arg(long, default_value = "predicted_points.csv")]
        out: PathBuf,
    },
    /// Sweep skip thresholds over predictions
    Threshold {
        #[arg(long = "in", default_value = "predicted_points.csv")]
        input: PathBuf,
        #[arg(long, default_value = "threshold_summary.csv")]
        out: PathBuf,
        #[arg(long)]
        keep_target: Option<f64>,
        #[arg(long)]
        steps: Option<usize>,
    },
}
