use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::domain::errors::StudyError;
use crate::trace::{FlatRow, FlatValue};

pub fn ensure_input(path: &Path) -> Result<(), StudyError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StudyError::InputNotFound(path.to_path_buf()))
    }
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Overwrite `path` with `header` followed by one record per row. The
/// header is written even when there are no rows.
pub fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> anyhow::Result<()> {
    ensure_parent(path)?;
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    w.write_record(header)?;
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}

/// Columns are the union of all row keys in first-seen order; missing
/// cells are empty. Returns the column count.
pub fn write_flat_csv(path: &Path, rows: &[FlatRow]) -> anyhow::Result<usize> {
    let columns: IndexSet<&str> = rows
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();

    ensure_parent(path)?;
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(columns.iter())?;
    for row in rows {
        w.write_record(
            columns
                .iter()
                .map(|c| row.get(*c).map(ToString::to_string).unwrap_or_default()),
        )?;
    }
    w.flush()?;
    Ok(columns.len())
}

/// Typed view of a CSV cell: empty → Null, then integer, then float,
/// else text.
pub fn parse_cell(raw: &str) -> FlatValue {
    let s = raw.trim();
    if s.is_empty() {
        return FlatValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return FlatValue::Int(i);
    }
    match s.parse::<f64>() {
        Ok(x) => FlatValue::Float(x),
        Err(_) => FlatValue::Text(raw.to_string()),
    }
}

/// Read a headed CSV into rows keyed by column. Short records leave
/// their trailing columns out.
pub fn read_table(path: &Path) -> anyhow::Result<(Vec<String>, Vec<FlatRow>)> {
    ensure_input(path)?;
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let row: FlatRow = header
            .iter()
            .zip(rec.iter())
            .map(|(k, v)| (k.clone(), parse_cell(v)))
            .collect();
        rows.push(row);
    }
    Ok((header, rows))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    ensure_input(path)?;
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_lines(path: &Path, lines: &[String]) -> anyhow::Result<()> {
    ensure_parent(path)?;
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct Pair {
        name: String,
        score: Option<f64>,
    }

    #[test]
    fn cells_are_typed_from_text() {
        assert_eq!(parse_cell(""), FlatValue::Null);
        assert_eq!(parse_cell("12"), FlatValue::Int(12));
        assert_eq!(parse_cell("-1.5"), FlatValue::Float(-1.5));
        assert_eq!(parse_cell("AAA"), FlatValue::Text("AAA".into()));
    }

    #[test]
    fn header_is_written_for_empty_output() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("out/empty.csv");
        write_csv::<Pair>(&p, &["name", "score"], &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&p).unwrap(), "name,score\n");
    }

    #[test]
    fn none_serializes_as_empty_cell() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("pairs.csv");
        let rows = vec![
            Pair {
                name: "a".into(),
                score: Some(0.5),
            },
            Pair {
                name: "b".into(),
                score: None,
            },
        ];
        write_csv(&p, &["name", "score"], &rows).unwrap();
        assert_eq!(
            std::fs::read_to_string(&p).unwrap(),
            "name,score\na,0.5\nb,\n"
        );
    }

    #[test]
    fn flat_rows_share_a_union_header() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("flat.csv");
        let a: FlatRow = [("x".to_string(), FlatValue::Int(1))].into_iter().collect();
        let b: FlatRow = [
            ("y".to_string(), FlatValue::Text("t".into())),
            ("x".to_string(), FlatValue::Null),
        ]
        .into_iter()
        .collect();
        assert_eq!(write_flat_csv(&p, &[a, b]).unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&p).unwrap(), "x,y\n1,\n,t\n");

        let (header, rows) = read_table(&p).unwrap();
        assert_eq!(header, vec!["x", "y"]);
        assert_eq!(rows[0]["x"], FlatValue::Int(1));
        assert_eq!(rows[1]["y"], FlatValue::Text("t".into()));
    }

    #[test]
    fn missing_table_is_input_not_found() {
        let err = read_table(Path::new("/definitely/not/here.csv")).unwrap_err();
        let study = err.downcast_ref::<StudyError>().unwrap();
        assert_eq!(study.code(), "INPUT_NOT_FOUND");
    }
}
