//! Shared data model layer (structs/constants only).
//!
//! ## Files
//! - `models.rs` — JSON envelopes, CSV row types and command reports.
//! - `constants.rs` — column names, penalty values and default file names.
//! - `errors.rs` — typed failures carrying a stable error code.
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem side effects.
//!
//! ## Compatibility note
//! Field names here are CSV headers and `--json` output keys. Keep
//! schema-impacting changes synchronized with `docs/contracts/*`.

pub mod constants;
pub mod errors;
pub mod models;
