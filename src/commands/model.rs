use crate::services::estimate::{self, ScoringContext};
use crate::services::records::{read_trace_lines, TraceLine};
use crate::services::{surrogate, threshold};
use crate::*;

pub fn handle_model_commands(cli: &Cli, config: &StudyConfig) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Estimate {
            input,
            out,
            stocks_cache,
            points_store,
        } => {
            let lines = read_trace_lines(input)?;
            let ctx = ScoringContext::load(
                stocks_cache
                    .as_deref()
                    .unwrap_or(config.estimate.stocks_cache.as_path()),
                points_store
                    .as_deref()
                    .unwrap_or(config.estimate.points_store.as_path()),
            );
            let rows: Vec<EstimateRow> = lines
                .iter()
                .filter_map(|line| match line {
                    TraceLine::Record(entry) if entry.is_object() => {
                        Some(estimate::estimate_entry(entry, &ctx))
                    }
                    _ => None,
                })
                .collect();
            write_csv(out, &estimate::ESTIMATE_HEADER, &rows)?;
            let report = estimate::summarize(&out.display().to_string(), &rows);
            print_one(cli.json, report, |r| {
                vec![
                    format!("wrote {} rows to {}", r.rows, r.out),
                    format!("records with actual points: {}", r.with_actual),
                    format!(
                        "expected points mean={} std={}",
                        fmt_opt(r.expected_mean),
                        fmt_opt(r.expected_std)
                    ),
                    format!(
                        "actual points mean={} std={}",
                        fmt_opt(r.actual_mean),
                        fmt_opt(r.actual_std)
                    ),
                    format!("pearson (expected vs actual): {}", fmt_opt(r.correlation)),
                ]
            })?;
        }
        Commands::Fit { input, out } => {
            let (_, table) = read_table(input)?;
            let rows = surrogate::training_rows(&table);
            let model = surrogate::fit(&rows)?;
            write_json(out, &model)?;
            let report = FitReport {
                out: out.display().to_string(),
                rows: rows.len(),
                model,
            };
            print_one(cli.json, report, |r| {
                let mut lines = vec![
                    format!("fitted on {} rows, wrote {}", r.rows, r.out),
                    format!("intercept\t{:.6}", r.model.intercept),
                ];
                lines.extend(
                    r.model
                        .feature_names
                        .iter()
                        .zip(&r.model.coefficients)
                        .map(|(name, c)| format!("{name}\t{c:.6}")),
                );
                lines
            })?;
        }
        Commands::Predict { input, model, out } => {
            let surrogate_model: Surrogate = read_json(model).map_err(|e| {
                if e.is::<StudyError>() {
                    e
                } else {
                    StudyError::InvalidModel(format!("{e:#}")).into()
                }
            })?;
            surrogate_model.validate()?;
            let (_, table) = read_table(input)?;
            let rows = surrogate::training_rows(&table);
            if rows.is_empty() {
                return Err(StudyError::NotEnoughRows {
                    needed: 1,
                    found: 0,
                }
                .into());
            }
            let predictions = surrogate::predict_rows(&surrogate_model, &rows);
            write_csv(out, &surrogate::PREDICTION_HEADER, &predictions)?;
            let report = surrogate::score(&out.display().to_string(), &predictions);
            print_one(cli.json, report, |r| {
                vec![
                    format!("wrote {} predictions to {}", r.rows, r.out),
                    format!("pearson r: {}", fmt_opt(r.pearson_r)),
                    format!("r2: {:.4}", r.r2),
                    format!("mae: {:.4}", r.mae),
                ]
            })?;
        }
        Commands::Threshold {
            input,
            out,
            keep_target,
            steps,
        } => {
            let (_, table) = read_table(input)?;
            let preds = threshold::predictions(&table);
            let keep_target = keep_target.unwrap_or(config.threshold.keep_target);
            let rows = threshold::sweep(
                &preds,
                steps.unwrap_or(config.threshold.steps),
                config.threshold.margin,
            )?;
            write_csv(out, &threshold::THRESHOLD_HEADER, &rows)?;
            let report = ThresholdReport {
                out: out.display().to_string(),
                predictions: preds.len(),
                thresholds: rows.len(),
                keep_target,
                best_mean_kept: threshold::best_mean_kept(&rows),
                closest_keep: threshold::closest_keep(&rows, keep_target),
            };
            let sampled: Vec<String> = rows
                .iter()
                .step_by(5)
                .map(|s| {
                    format!(
                        "{:.2}\t{:.1}%\t{}\t{:.1}\t{:.1}",
                        s.threshold,
                        s.skip_fraction * 100.0,
                        s.kept_count,
                        s.mean_actual_kept,
                        s.total_actual_kept
                    )
                })
                .collect();
            print_one(cli.json, report, |r| {
                let mut lines = vec!["threshold\tskip%\tkept\tmean_kept\ttotal_kept".to_string()];
                lines.extend(sampled.iter().cloned());
                if let Some(b) = &r.best_mean_kept {
                    lines.push(format!(
                        "max mean points per kept request: threshold={:.2} mean_actual_kept={:.1} skip={:.1}%",
                        b.threshold,
                        b.mean_actual_kept,
                        b.skip_fraction * 100.0
                    ));
                }
                if let Some(c) = &r.closest_keep {
                    lines.push(format!(
                        "keep ~{:.0}%: threshold={:.2} skip={:.1}%",
                        r.keep_target * 100.0,
                        c.threshold,
                        c.skip_fraction * 100.0
                    ));
                }
                lines.push(format!("wrote threshold summary to {}", r.out));
                lines
            })?;
        }
        Commands::Flatten { .. }
        | Commands::Study { .. }
        | Commands::Importance { .. }
        | Commands::Labels { .. }
        | Commands::Intervals { .. } => unreachable!("handled by analysis commands"),
    }
    Ok(())
}
