//! Trace flattening and points labeling.
//!
//! Every command reads evaluator records through this module, so the
//! flatten rules and the penalty policy exist exactly once.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Number, Value};
use std::collections::HashSet;
use std::fmt;

use crate::domain::constants::{BUDGET_BREACH_PENALTY, ERROR_PENALTY, POINTS_COLUMN};

/// Scalar list elements emitted individually before only the summary keys remain.
const MAX_LIST_ELEMENTS: usize = 5;
const MIXED_SAMPLE_LEN: usize = 3;

const BREACH_TERMS: [&str; 4] = ["breach", "breached", "exceed", "exceeded"];
const OVER_BUDGET_PHRASES: [&str; 5] = [
    "budget breached",
    "budget breach",
    "would exceed budget",
    "exceeds budget",
    "exceed budget",
];

/// A single flattened cell. Booleans are folded into `Int(0 | 1)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlatValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

/// Dot-path → scalar, in first-emitted order.
pub type FlatRow = IndexMap<String, FlatValue>;

impl FlatValue {
    pub fn from_scalar(value: &Value) -> Self {
        match value {
            Value::Null => FlatValue::Null,
            Value::Bool(b) => FlatValue::Int(i64::from(*b)),
            Value::Number(n) => from_number(n),
            Value::String(s) => FlatValue::Text(s.clone()),
            other => FlatValue::Text(other.to_string()),
        }
    }

    /// Numeric view used by every aggregation. Numeric strings count;
    /// NaN and infinities do not.
    pub fn as_f64(&self) -> Option<f64> {
        let x = match self {
            FlatValue::Null => return None,
            FlatValue::Int(i) => *i as f64,
            FlatValue::Float(f) => *f,
            FlatValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        x.is_finite().then_some(x)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FlatValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FlatValue::Null => true,
            FlatValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for FlatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlatValue::Null => Ok(()),
            FlatValue::Int(i) => write!(f, "{i}"),
            FlatValue::Float(x) => write!(f, "{x}"),
            FlatValue::Text(s) => f.write_str(s),
        }
    }
}

fn from_number(n: &Number) -> FlatValue {
    match n.as_i64() {
        Some(i) => FlatValue::Int(i),
        None => n
            .as_f64()
            .map(FlatValue::Float)
            .unwrap_or_else(|| FlatValue::Text(n.to_string())),
    }
}

/// Flatten `value` under `prefix` (empty at top level).
pub fn flatten(value: &Value, prefix: &str) -> FlatRow {
    let mut out = FlatRow::new();
    flatten_into(value, prefix, &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut FlatRow) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(child, &join_path(prefix, key), out);
            }
        }
        Value::Array(items) => flatten_list(items, prefix, out),
        Value::String(s) => match parse_embedded_json(s) {
            // stringified payloads replace the string at the same path
            Some(nested) => flatten_into(&nested, prefix, out),
            None => {
                out.insert(prefix.to_string(), FlatValue::Text(s.clone()));
            }
        },
        scalar => {
            out.insert(prefix.to_string(), FlatValue::from_scalar(scalar));
        }
    }
}

fn flatten_list(items: &[Value], prefix: &str, out: &mut FlatRow) {
    out.insert(
        format!("{prefix}.__len__"),
        FlatValue::Int(items.len() as i64),
    );
    if items.is_empty() {
        return;
    }

    if items.iter().all(is_scalar) {
        for (i, item) in items.iter().take(MAX_LIST_ELEMENTS).enumerate() {
            out.insert(format!("{prefix}.{i}"), FlatValue::from_scalar(item));
        }
        let distinct: HashSet<String> = items.iter().map(distinct_key).collect();
        out.insert(
            format!("{prefix}.__unique_count"),
            FlatValue::Int(distinct.len() as i64),
        );
    } else if items.iter().all(Value::is_object) {
        let mut keys: Vec<&str> = items[0]
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        out.insert(
            format!("{prefix}.__sample_keys"),
            FlatValue::Text(keys.join(",")),
        );
    } else {
        let sample = Value::Array(items.iter().take(MIXED_SAMPLE_LEN).cloned().collect());
        out.insert(
            format!("{prefix}.__sample"),
            FlatValue::Text(sample.to_string()),
        );
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

// Numbers compare by value (1 == 1.0 == true); strings compare exactly.
fn distinct_key(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("n:{}", i64::from(*b)),
        Value::Number(n) => numeric_key(n),
        Value::String(s) => format!("s:{s}"),
        other => other.to_string(),
    }
}

fn numeric_key(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return format!("n:{i}");
    }
    match n.as_f64() {
        Some(x) if x.fract() == 0.0 && x.abs() < 9.0e15 => format!("n:{}", x as i64),
        Some(x) => format!("n:{x}"),
        None => format!("n:{n}"),
    }
}

/// Best-effort unwrap of JSON that was stored as a string inside a response field.
pub fn parse_embedded_json(raw: &str) -> Option<Value> {
    let s = raw.trim();
    let looks_nested =
        (s.starts_with('{') && s.ends_with('}')) || (s.starts_with('[') && s.ends_with(']'));
    if !looks_nested {
        return None;
    }
    serde_json::from_str(s).ok()
}

fn last_segment_is(path: &str, name: &str) -> bool {
    path.rsplit('.')
        .next()
        .map(|seg| seg.eq_ignore_ascii_case(name))
        .unwrap_or(false)
}

/// First key, in row order, whose final segment is `points` (any case).
pub fn find_points_key(row: &FlatRow) -> Option<(&str, &FlatValue)> {
    row.iter()
        .find(|(k, _)| last_segment_is(k, "points"))
        .map(|(k, v)| (k.as_str(), v))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelSource {
    Explicit { key: String },
    BudgetBreach,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub value: FlatValue,
    pub source: LabelSource,
}

/// Evaluator wording for a request rejected because it went over budget.
pub fn is_over_budget_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    (lower.contains("budget") && BREACH_TERMS.iter().any(|t| lower.contains(t)))
        || OVER_BUDGET_PHRASES.iter().any(|p| lower.contains(p))
}

fn penalty_for(text: Option<&str>) -> Label {
    if text.map(is_over_budget_text).unwrap_or(false) {
        Label {
            value: FlatValue::Int(BUDGET_BREACH_PENALTY),
            source: LabelSource::BudgetBreach,
        }
    } else {
        Label {
            value: FlatValue::Int(ERROR_PENALTY),
            source: LabelSource::Error,
        }
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|x| x != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Derive the points label for one record. First match wins:
/// explicit points key, then `result.ok == false` / `result.error`,
/// then any flattened `error` field. `None` means the record is dropped.
pub fn derive_label(record: &Value, row: &FlatRow) -> Option<Label> {
    if let Some((key, value)) = find_points_key(row) {
        return Some(Label {
            value: value.clone(),
            source: LabelSource::Explicit {
                key: key.to_string(),
            },
        });
    }

    if let Some(result) = record.get("result").and_then(Value::as_object) {
        let failed = result.get("ok") == Some(&Value::Bool(false))
            || result.get("error").map(is_truthy).unwrap_or(false);
        if failed {
            let text = non_empty_str(result.get("error"))
                .or_else(|| non_empty_str(result.get("response")));
            return Some(penalty_for(text));
        }
    }

    row.iter()
        .find(|(k, v)| last_segment_is(k, "error") && !v.is_blank())
        .map(|(_, v)| penalty_for(v.as_text()))
}

/// Attach `__points__` to `row`, or drop it.
pub fn label(record: &Value, mut row: FlatRow) -> Option<FlatRow> {
    let label = derive_label(record, &row)?;
    row.insert(POINTS_COLUMN.to_string(), label.value);
    Some(row)
}

/// Flatten and label in one step; the common entry point for commands.
pub fn labeled_row(record: &Value) -> Option<FlatRow> {
    label(record, flatten(record, ""))
}
