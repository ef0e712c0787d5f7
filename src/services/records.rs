use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::domain::errors::StudyError;

/// A set of trace files validated up front and read lazily.
#[derive(Debug, Clone)]
pub struct RecordSource {
    paths: Vec<PathBuf>,
}

impl RecordSource {
    /// Every path must exist; nothing is read yet.
    pub fn open(paths: &[PathBuf]) -> Result<Self, StudyError> {
        if paths.is_empty() {
            return Err(StudyError::NoInput);
        }
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(StudyError::InputNotFound(missing.clone()));
        }
        Ok(Self {
            paths: paths.to_vec(),
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// A fresh pass over all files. Each call re-opens them.
    pub fn records(&self) -> Records<'_> {
        Records {
            paths: &self.paths,
            next_file: 0,
            pending: VecDeque::new(),
        }
    }
}

pub struct Records<'a> {
    paths: &'a [PathBuf],
    next_file: usize,
    pending: VecDeque<Value>,
}

impl Iterator for Records<'_> {
    type Item = anyhow::Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            let path = self.paths.get(self.next_file)?;
            self.next_file += 1;
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    let records = parse_records(&text);
                    tracing::debug!(path = %path.display(), records = records.len(), "loaded trace file");
                    self.pending.extend(records);
                }
                Err(e) => {
                    return Some(Err(anyhow::Error::new(e)
                        .context(format!("reading {}", path.display()))))
                }
            }
        }
    }
}

fn significant_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("//"))
}

/// Line mode applies when the first significant line is a JSON object on
/// its own, however many lines follow.
fn is_line_delimited(text: &str) -> bool {
    significant_lines(text)
        .next()
        .and_then(|l| serde_json::from_str::<Value>(l).ok())
        .map(|v| v.is_object())
        .unwrap_or(false)
}

fn parse_lines(text: &str) -> Vec<Value> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(v) if v.is_object() => out.push(v),
            Ok(_) => tracing::debug!(line = idx + 1, "skipping non-object line"),
            Err(e) => tracing::debug!(line = idx + 1, error = %e, "skipping unparseable line"),
        }
    }
    out
}

/// Records of one file's text, in file order.
pub fn parse_records(text: &str) -> Vec<Value> {
    if is_line_delimited(text) {
        return parse_lines(text);
    }
    match serde_json::from_str::<Value>(text) {
        Ok(doc) => expand_document(doc),
        Err(_) => parse_lines(text),
    }
}

/// Records held by a single JSON document.
pub fn expand_document(doc: Value) -> Vec<Value> {
    match doc {
        Value::Array(items) => items.into_iter().filter(Value::is_object).collect(),
        Value::Object(map) => {
            if !map.values().any(Value::is_array) {
                return vec![Value::Object(map)];
            }
            let nested: Vec<Value> = map
                .values()
                .filter_map(Value::as_array)
                .flatten()
                .filter(|v| v.is_object())
                .cloned()
                .collect();
            if nested.is_empty() {
                vec![Value::Object(map)]
            } else {
                nested
            }
        }
        _ => Vec::new(),
    }
}

/// One line of a commented JSONL trace.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceLine {
    Comment(String),
    Record(Value),
}

/// Read a JSONL trace keeping `//` comment lines in order. Unparseable
/// lines are skipped.
pub fn read_trace_lines(path: &Path) -> Result<Vec<TraceLine>, StudyError> {
    if !path.is_file() {
        return Err(StudyError::InputNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|_| StudyError::InputNotFound(path.to_path_buf()))?;
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("//") {
            out.push(TraceLine::Comment(line.to_string()));
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(v) => out.push(TraceLine::Record(v)),
            Err(e) => tracing::debug!(line = idx + 1, error = %e, "skipping unparseable trace line"),
        }
    }
    Ok(out)
}
