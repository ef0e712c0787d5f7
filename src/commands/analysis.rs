use crate::commands::resolve_inputs;
use crate::services::records::read_trace_lines;
use crate::services::{importance, intervals, portfolio, study};
use crate::trace::{self, FlatRow, LabelSource};
use crate::*;

fn describe(source: &RecordSource) -> String {
    source
        .paths()
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn labeled_rows(
    source: &RecordSource,
    with_portfolio: bool,
) -> anyhow::Result<(usize, Vec<FlatRow>)> {
    let mut records = 0usize;
    let mut rows = Vec::new();
    for record in source.records() {
        let record = record?;
        records += 1;
        if let Some(mut row) = trace::labeled_row(&record) {
            if with_portfolio {
                row.extend(portfolio::portfolio_features(&record));
            }
            rows.push(row);
        }
    }
    Ok((records, rows))
}

pub fn handle_analysis_commands(cli: &Cli, config: &StudyConfig) -> anyhow::Result<bool> {
    match &cli.command {
        Commands::Flatten { files, out } => {
            let source = resolve_inputs(files, config)?;
            let (records, rows) = labeled_rows(&source, true)?;
            if rows.is_empty() {
                return Err(StudyError::NoRecords(describe(&source)).into());
            }
            let columns = write_flat_csv(out, &rows)?;
            tracing::info!(rows = rows.len(), columns, "wrote flattened rows");
            let report = FlattenReport {
                out: out.display().to_string(),
                records,
                rows: rows.len(),
                dropped: records - rows.len(),
                columns,
            };
            print_one(cli.json, report, |r| {
                vec![format!(
                    "wrote {} rows ({} columns, {} records dropped) to {}",
                    r.rows, r.columns, r.dropped, r.out
                )]
            })?;
        }
        Commands::Study { files, out, top } => {
            let source = resolve_inputs(files, config)?;
            let (_, rows) = labeled_rows(&source, false)?;
            let scored = study::numeric_targets(&rows).len();
            if scored == 0 {
                return Err(StudyError::NoRecords(describe(&source)).into());
            }
            let correlations = study::correlate(&rows, config.study.min_pairs);
            write_csv(out, &study::CORRELATION_HEADER, &correlations)?;
            let report = study::summarize(
                &out.display().to_string(),
                scored,
                &correlations,
                top.unwrap_or(config.study.top),
            );
            print_one(cli.json, report, study_lines)?;
        }
        Commands::Importance { input, out, top } => {
            let table = importance::load_table(input)?;
            let target = importance::find_target(&table.columns)
                .ok_or_else(|| StudyError::MissingColumn("__points__ or points".to_string()))?
                .to_string();
            tracing::info!(target = %target, "using target column");
            let ranked: Vec<ImportanceRow> = importance::rank_features(&table, &target)?
                .into_iter()
                .take(top.unwrap_or(config.study.top))
                .collect();
            write_csv(out, &importance::IMPORTANCE_HEADER, &ranked)?;
            let report = ImportanceReport {
                out: out.display().to_string(),
                target,
                method: importance::METHOD.to_string(),
                rows: table.rows.len(),
                features: ranked,
            };
            print_one(cli.json, report, |r| {
                let mut lines = vec![format!("target: {} ({} rows)", r.target, r.rows)];
                lines.extend(
                    r.features
                        .iter()
                        .map(|f| format!("{}\t{}", f.feature, fmt_opt(f.importance))),
                );
                lines
            })?;
        }
        Commands::Labels { files } => {
            let source = resolve_inputs(files, config)?;
            let mut summary = LabelSummary::default();
            for record in source.records() {
                let record = record?;
                summary.records += 1;
                let row = trace::flatten(&record, "");
                let Some(label) = trace::derive_label(&record, &row) else {
                    summary.dropped += 1;
                    continue;
                };
                summary.labeled += 1;
                match label.source {
                    LabelSource::Explicit { .. } => {
                        summary.explicit += 1;
                        if label.value.as_f64().is_none() {
                            summary.non_numeric_points += 1;
                        }
                    }
                    LabelSource::BudgetBreach => summary.budget_breach += 1,
                    LabelSource::Error => summary.error += 1,
                }
            }
            print_one(cli.json, summary, |s| {
                vec![
                    format!("records\t{}", s.records),
                    format!("explicit\t{}", s.explicit),
                    format!("budget_breach\t{}", s.budget_breach),
                    format!("error\t{}", s.error),
                    format!("dropped\t{}", s.dropped),
                    format!("non_numeric_points\t{}", s.non_numeric_points),
                ]
            })?;
        }
        Commands::Intervals {
            input,
            out,
            comments_out,
        } => {
            let lines = read_trace_lines(input)?;
            let events = intervals::events(&lines);
            let analysis = intervals::analyze(&input.display().to_string(), &events);
            if analysis.report.records == 0 {
                tracing::warn!(input = %input.display(), "no records with points");
            } else {
                if let Some(path) = out {
                    write_csv(path, &intervals::INTERVAL_HEADER, &analysis.intervals)?;
                }
                if let Some(path) = comments_out {
                    write_lines(path, &intervals::comment_lines(&analysis.report.comments))?;
                }
            }
            print_one(cli.json, analysis.report, intervals_lines)?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn study_lines(r: &StudyReport) -> Vec<String> {
    let mut lines = vec![format!(
        "wrote {} features from {} rows to {}",
        r.features, r.rows, r.out
    )];
    if r.top_positive.is_empty() {
        lines.push("no numeric features with valid correlations".to_string());
    } else {
        lines.push("top positive numeric correlations:".to_string());
        lines.extend(
            r.top_positive
                .iter()
                .map(|f| format!("  {}\t{:.4}\t{}", f.feature, f.correlation, f.n)),
        );
        lines.push("top negative numeric correlations:".to_string());
        lines.extend(
            r.top_negative
                .iter()
                .map(|f| format!("  {}\t{:.4}\t{}", f.feature, f.correlation, f.n)),
        );
    }
    if !r.top_categorical.is_empty() {
        lines.push("top categorical effects:".to_string());
        lines.extend(
            r.top_categorical
                .iter()
                .map(|c| format!("  {}\t{}\t{}", c.feature, c.n, c.notes)),
        );
    }
    lines
}

fn intervals_lines(r: &IntervalsReport) -> Vec<String> {
    let three = |v: Option<f64>| v.map(|x| format!("{x:.3}"));
    let mut lines = vec![
        format!("input: {}", r.input),
        format!("records with points: {}", r.records),
    ];
    if let Some(m) = three(r.overall_mean) {
        lines.push(format!("overall mean points: {m}"));
    }
    match three(r.mean_following_comments) {
        Some(m) => lines.push(format!(
            "mean points right after comments: {m} ({} comments)",
            r.following_count
        )),
        None => lines.push("no comment events found".to_string()),
    }
    match three(r.mean_between_comments) {
        Some(m) => lines.push(format!(
            "mean points between comments: {m} ({} intervals)",
            r.interval_count
        )),
        None => lines.push("no intervals between comment events found".to_string()),
    }
    lines.extend(intervals::comment_lines(&r.comments));
    lines
}
