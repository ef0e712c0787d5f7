//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Files
//! - `analysis.rs` — flatten/study/importance/labels/intervals.
//! - `model.rs` — estimate/fit/predict/threshold.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate analysis logic to `services/*`.
//! - Keep artifact columns and output schema stable.

use crate::*;

pub mod analysis;
pub mod model;

pub use analysis::handle_analysis_commands;
pub use model::handle_model_commands;

pub fn dispatch(cli: &Cli, config: &StudyConfig) -> anyhow::Result<()> {
    if handle_analysis_commands(cli, config)? {
        return Ok(());
    }
    handle_model_commands(cli, config)
}

/// Explicit files, else the configured defaults that exist.
pub fn resolve_inputs(files: &[std::path::PathBuf], config: &StudyConfig) -> Result<RecordSource, StudyError> {
    if files.is_empty() {
        let defaults = config.existing_default_traces();
        tracing::debug!(count = defaults.len(), "using default trace files");
        return RecordSource::open(&defaults);
    }
    RecordSource::open(files)
}
