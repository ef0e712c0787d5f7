use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

use crate::domain::models::{EstimateReport, EstimateRow};
use crate::services::stats;
use crate::trace::{is_truthy, parse_embedded_json};

pub const ESTIMATE_HEADER: [&str; 14] = [
    "ts",
    "name",
    "budget",
    "eligible_count",
    "start_year",
    "end_year",
    "risk_tolerance",
    "expected_points",
    "actual_points",
    "skipped",
    "avg_volatility",
    "avg_log_marketcap",
    "avg_points_score",
    "portfolio_size",
];

pub const DEFAULT_RISK: &str = "Moderate";

/// Score multiplier for a risk tolerance; unknown values are neutral.
pub fn risk_multiplier(risk: &str) -> f64 {
    match risk {
        "Conservative" => 0.9,
        "Moderate" => 1.0,
        "Aggressive" => 1.1,
        _ => 1.0,
    }
}

/// Inclusive span in years, or 1 when either end is missing or reversed.
pub fn period_years(start: Option<i64>, end: Option<i64>) -> f64 {
    match (start, end) {
        (Some(s), Some(e)) if e >= s => (e - s + 1) as f64,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockMeta {
    pub volatility: Option<f64>,
    pub market_cap: Option<f64>,
}

/// Read-only lookup tables shared by every estimate in a run.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    stocks: HashMap<String, StockMeta>,
    scores: HashMap<String, Map<String, Value>>,
}

fn read_json_value(path: &Path, what: &str) -> Option<Value> {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "{what} not present");
        return None;
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(anyhow::Error::from));
    match parsed {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable {what}");
            None
        }
    }
}

impl ScoringContext {
    /// Missing or unreadable files leave the matching table empty.
    pub fn load(stocks_cache: &Path, points_store: &Path) -> Self {
        let empty = Value::Null;
        let stocks_doc = read_json_value(stocks_cache, "stocks cache");
        let points_doc = read_json_value(points_store, "points store");
        let ctx = Self::from_documents(
            stocks_doc.as_ref().unwrap_or(&empty),
            points_doc.as_ref().unwrap_or(&empty),
        );
        tracing::debug!(
            stocks = ctx.stocks.len(),
            scored = ctx.scores.len(),
            "scoring context ready"
        );
        ctx
    }

    /// Documents without the expected `stocks` / `scores` shape give
    /// empty tables.
    pub fn from_documents(stocks_doc: &Value, points_doc: &Value) -> Self {
        Self {
            stocks: stocks_from(stocks_doc),
            scores: scores_from(points_doc),
        }
    }

    pub fn stock(&self, ticker: &str) -> Option<&StockMeta> {
        self.stocks.get(ticker)
    }

    /// Mean of the numeric bucket scores for `ticker`, or 0.
    pub fn points_score(&self, ticker: &str) -> f64 {
        let Some(buckets) = self.scores.get(ticker) else {
            return 0.0;
        };
        let values: Vec<f64> = buckets.values().filter_map(Value::as_f64).collect();
        stats::mean(&values).unwrap_or(0.0)
    }
}

fn stocks_from(doc: &Value) -> HashMap<String, StockMeta> {
    doc.get("stocks")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|s| {
            let ticker = s.get("ticker")?.as_str()?.to_string();
            let meta = StockMeta {
                volatility: s.get("volatility").and_then(Value::as_f64),
                market_cap: s.get("market_cap").and_then(Value::as_f64),
            };
            Some((ticker, meta))
        })
        .collect()
}

fn scores_from(doc: &Value) -> HashMap<String, Map<String, Value>> {
    doc.get("scores")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(t, buckets)| Some((t.clone(), buckets.as_object()?.clone())))
        .collect()
}

fn num(v: Option<&Value>) -> f64 {
    v.and_then(Value::as_f64).unwrap_or(0.0)
}

fn year(v: Option<&Value>) -> Option<i64> {
    let v = v?;
    v.as_i64().or_else(|| v.as_f64().map(|f| f.trunc() as i64))
}

fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

struct PortfolioMix {
    avg_volatility: f64,
    avg_log_marketcap: f64,
    avg_points_score: f64,
    size: usize,
}

/// Quantity-weighted averages over the entry's positions.
fn portfolio_mix(entry: &Value, ctx: &ScoringContext) -> PortfolioMix {
    let positions: Vec<&Map<String, Value>> = entry
        .get("portfolio")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .collect();

    let mut total_qty = 0.0;
    let mut vol_sum = 0.0;
    let mut logcap_sum = 0.0;
    let mut pts_sum = 0.0;
    for pos in &positions {
        let ticker = pos.get("ticker").and_then(Value::as_str).unwrap_or_default();
        let q = pos
            .get("quantity")
            .and_then(Value::as_f64)
            .map(f64::trunc)
            .filter(|q| *q != 0.0)
            .unwrap_or(1.0);
        total_qty += q;
        if let Some(meta) = ctx.stock(ticker) {
            vol_sum += meta.volatility.unwrap_or(0.0) * q;
            if let Some(mc) = meta.market_cap.filter(|mc| *mc > 0.0) {
                logcap_sum += mc.log10() * q;
            }
        }
        pts_sum += ctx.points_score(ticker) * q;
    }

    if total_qty > 0.0 {
        PortfolioMix {
            avg_volatility: vol_sum / total_qty,
            avg_log_marketcap: if logcap_sum > 0.0 {
                logcap_sum / total_qty
            } else {
                0.0
            },
            avg_points_score: pts_sum / total_qty,
            size: positions.len(),
        }
    } else {
        PortfolioMix {
            avg_volatility: 0.0,
            avg_log_marketcap: 0.0,
            avg_points_score: 0.0,
            size: positions.len(),
        }
    }
}

/// Evaluator points from a successful result, if it reported any.
pub fn actual_points(entry: &Value) -> Option<f64> {
    let result = entry.get("result")?.as_object()?;
    if !result.get("ok").map(is_truthy).unwrap_or(false) {
        return None;
    }
    let inner = match result.get("response")? {
        Value::String(s) => parse_embedded_json(s)?,
        other => other.clone(),
    };
    inner.as_object()?.get("points").and_then(|p| match p {
        Value::String(s) => s.trim().parse().ok(),
        v => v.as_f64(),
    })
}

/// Heuristic expected points: budget, eligibility and period scores
/// scaled by the risk multiplier, floored at zero.
pub fn estimate_entry(entry: &Value, ctx: &ScoringContext) -> EstimateRow {
    let empty = Map::new();
    let profile = entry
        .get("parsed_profile")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let budget = num(profile.get("budget"));
    let eligible_count = num(entry.get("eligible_count"));
    let start_year = year(profile.get("start_year"));
    let end_year = year(profile.get("end_year"));
    let risk = profile
        .get("risk_tolerance")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_RISK)
        .to_string();

    let budget_score = budget.max(0.0).ln_1p() / 10.0;
    let eligible_score = eligible_count.min(200.0) / 20.0;
    let period_score = (period_years(start_year, end_year) / 5.0).min(3.0);
    let base = (budget_score + eligible_score + period_score) * 10.0;
    let expected_points = (base * risk_multiplier(&risk)).max(0.0);

    let mix = portfolio_mix(entry, ctx);
    EstimateRow {
        ts: text(entry.get("ts")),
        name: text(profile.get("name")),
        budget,
        eligible_count,
        start_year,
        end_year,
        risk_tolerance: risk,
        expected_points,
        actual_points: actual_points(entry),
        skipped: entry.get("skipped").map(is_truthy).unwrap_or(false),
        avg_volatility: mix.avg_volatility,
        avg_log_marketcap: mix.avg_log_marketcap,
        avg_points_score: mix.avg_points_score,
        portfolio_size: mix.size,
    }
}

pub fn summarize(out: &str, rows: &[EstimateRow]) -> EstimateReport {
    let expected: Vec<f64> = rows.iter().map(|r| r.expected_points).collect();
    let (paired_expected, actual): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|r| r.actual_points.map(|a| (r.expected_points, a)))
        .unzip();
    EstimateReport {
        out: out.to_string(),
        rows: rows.len(),
        with_actual: actual.len(),
        expected_mean: stats::mean(&expected),
        expected_std: stats::pstdev(&expected),
        actual_mean: stats::mean(&actual),
        actual_std: stats::pstdev(&actual),
        correlation: stats::pearson(&paired_expected, &actual, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn ctx() -> ScoringContext {
        ScoringContext::from_documents(
            &json!({"stocks": [
                {"ticker": "AAA", "volatility": 0.2, "market_cap": 1.0e6},
                {"ticker": "BBB", "volatility": 0.4, "market_cap": 100.0},
                {"volatility": 9.0}
            ]}),
            &json!({"scores": {"AAA": {"low": 1, "medium": 3, "high": "x"}}}),
        )
    }

    #[test]
    fn points_score_averages_numeric_buckets() {
        let c = ctx();
        assert_eq!(c.points_score("AAA"), 2.0);
        assert_eq!(c.points_score("ZZZ"), 0.0);
    }

    #[test]
    fn expected_points_follow_the_scoring_formula() {
        let entry = json!({
            "ts": "t1",
            "eligible_count": 400,
            "parsed_profile": {
                "name": "Ann", "budget": 0, "start_year": 2000, "end_year": 2030,
                "risk_tolerance": "Aggressive"
            }
        });
        let row = estimate_entry(&entry, &ScoringContext::default());
        // eligible capped at 200 -> 10, period 31y capped at 3 -> (0 + 10 + 3) * 10 * 1.1
        assert!((row.expected_points - 143.0).abs() < 1e-9);
        assert_eq!(row.name, "Ann");
        assert_eq!(row.start_year, Some(2000));
        assert_eq!(row.actual_points, None);
        assert_eq!(row.portfolio_size, 0);
    }

    #[test]
    fn portfolio_averages_are_quantity_weighted() {
        let entry = json!({"portfolio": [
            {"ticker": "AAA", "quantity": 3},
            {"ticker": "BBB", "quantity": 1},
            {"ticker": "CCC"}
        ]});
        let row = estimate_entry(&entry, &ctx());
        // quantities 3 + 1 + 1
        assert!((row.avg_volatility - (0.6 + 0.4) / 5.0).abs() < 1e-12);
        assert!((row.avg_log_marketcap - (18.0 + 2.0) / 5.0).abs() < 1e-9);
        assert!((row.avg_points_score - 6.0 / 5.0).abs() < 1e-12);
        assert_eq!(row.portfolio_size, 3);
        assert_eq!(row.risk_tolerance, DEFAULT_RISK);
    }

    #[test]
    fn actual_points_only_from_successful_results() {
        let ok = json!({"result": {"ok": true, "response": "{\"points\": 120}"}});
        assert_eq!(actual_points(&ok), Some(120.0));
        let obj = json!({"result": {"ok": true, "response": {"points": "7.5"}}});
        assert_eq!(actual_points(&obj), Some(7.5));
        let failed = json!({"result": {"ok": false, "response": "{\"points\": 120}"}});
        assert_eq!(actual_points(&failed), None);
        let garbled = json!({"result": {"ok": true, "response": "nope"}});
        assert_eq!(actual_points(&garbled), None);
    }

    #[test]
    fn unreadable_context_files_degrade_to_empty() {
        let tmp = TempDir::new().unwrap();
        let bad = tmp.path().join("stocks.json");
        std::fs::write(&bad, "{not json").unwrap();
        let c = ScoringContext::load(&bad, &tmp.path().join("absent.json"));
        assert!(c.stock("AAA").is_none());
        assert_eq!(c.points_score("AAA"), 0.0);
    }

    #[test]
    fn load_reads_both_side_files() {
        let tmp = TempDir::new().unwrap();
        let stocks = tmp.path().join("stocks.json");
        let points = tmp.path().join("points.json");
        std::fs::write(
            &stocks,
            json!({"stocks": [{"ticker": "AAA", "volatility": 0.3, "market_cap": 1000.0}]}).to_string(),
        )
        .unwrap();
        std::fs::write(&points, json!({"scores": {"AAA": {"low": 2, "high": 4}}}).to_string()).unwrap();
        let c = ScoringContext::load(&stocks, &points);
        assert_eq!(c.stock("AAA").and_then(|m| m.volatility), Some(0.3));
        assert_eq!(c.points_score("AAA"), 3.0);
    }

    #[test]
    fn summary_pairs_expected_with_actual() {
        let mut a = estimate_entry(&json!({}), &ScoringContext::default());
        a.expected_points = 1.0;
        a.actual_points = Some(10.0);
        let mut b = a.clone();
        b.expected_points = 2.0;
        b.actual_points = Some(20.0);
        let mut c = a.clone();
        c.expected_points = 3.0;
        c.actual_points = None;
        let s = summarize("e.csv", &[a, b, c]);
        assert_eq!(s.rows, 3);
        assert_eq!(s.with_actual, 2);
        assert_eq!(s.expected_mean, Some(2.0));
        assert!((s.correlation.unwrap() - 1.0).abs() < 1e-9);
    }
}
