//! Service layer containing analysis logic and side-effect helpers.
//!
//! ## Service map
//! - `records.rs` — trace file loading (JSONL, JSON documents, commented traces).
//! - `portfolio.rs` — portfolio-level features merged into flattened rows.
//! - `study.rs` — per-feature correlation against the points label.
//! - `importance.rs` — feature ranking against a target column.
//! - `intervals.rs` — points averages around comment events.
//! - `estimate.rs` — heuristic expected points and the scoring context.
//! - `surrogate.rs` — linear surrogate fit and prediction.
//! - `threshold.rs` — skip-threshold sweep over predictions.
//! - `stats.rs` — small numeric helpers.
//! - `config.rs` — optional TOML configuration.
//! - `storage.rs` — CSV/JSON artifact reading and writing.
//! - `output.rs` — JSON/text output helpers.
//!
//! ## Conventions
//! - Prefer pure helpers where possible.
//! - Side effects should be explicit and localized.
//! - Keep command handlers thin; delegate to services.

pub mod config;
pub mod estimate;
pub mod importance;
pub mod intervals;
pub mod output;
pub mod portfolio;
pub mod records;
pub mod stats;
pub mod storage;
pub mod study;
pub mod surrogate;
pub mod threshold;
