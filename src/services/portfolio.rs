use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::services::stats;
use crate::trace::{is_truthy, FlatRow, FlatValue};

const PORTFOLIO_KEYS: [&str; 3] = ["portfolio", "portfolio_positions", "portfolio_items"];
const TICKER_KEYS: [&str; 4] = ["ticker", "symbol", "id", "name"];
const RETURN_KEYS: [&str; 5] = [
    "historical_return",
    "return_pct",
    "return",
    "hist_return",
    "historical_pct",
];
const QUANTITY_KEYS: [&str; 3] = ["quantity", "qty", "shares"];
const PRICE_KEYS: [&str; 4] = ["price", "purchase_price", "current_price", "last_price"];
const COST_KEYS: [&str; 3] = ["cost", "position_cost", "value"];
const SECTOR_KEYS: [&str; 2] = ["sector", "industry"];

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First listed key that is present and coerces to a number.
fn numeric_field(item: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find_map(coerce_f64)
}

/// First truthy value among `keys`.
fn first_truthy<'a>(item: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| item.get(*k)).find(|v| is_truthy(v))
}

/// Aggregate features of the record's portfolio list. Empty when the
/// record carries no portfolio.
pub fn portfolio_features(record: &Value) -> FlatRow {
    let mut out = FlatRow::new();
    let Some(obj) = record.as_object() else {
        return out;
    };
    let Some(positions) = first_truthy(obj, &PORTFOLIO_KEYS).and_then(Value::as_array) else {
        return out;
    };

    let mut tickers = HashSet::new();
    let mut returns = Vec::new();
    let mut total_cost = 0.0;
    let mut sectors: IndexMap<String, i64> = IndexMap::new();

    for item in positions.iter().filter_map(Value::as_object) {
        if let Some(t) = first_truthy(item, &TICKER_KEYS).and_then(Value::as_str) {
            tickers.insert(t.to_string());
        }
        if let Some(r) = numeric_field(item, &RETURN_KEYS).filter(|r| r.is_finite()) {
            returns.push(r);
        }
        let qty = numeric_field(item, &QUANTITY_KEYS)
            .filter(|q| *q != 0.0)
            .unwrap_or(1.0);
        match numeric_field(item, &PRICE_KEYS) {
            Some(price) => total_cost += price * qty,
            None => {
                if let Some(cost) = numeric_field(item, &COST_KEYS) {
                    total_cost += cost;
                }
            }
        }
        if let Some(s) = first_truthy(item, &SECTOR_KEYS).and_then(Value::as_str) {
            *sectors.entry(s.to_string()).or_default() += 1;
        }
    }

    let float_or_null = |x: Option<f64>| x.map(FlatValue::Float).unwrap_or(FlatValue::Null);
    out.insert(
        "portfolio_size".into(),
        FlatValue::Int(positions.len() as i64),
    );
    out.insert(
        "portfolio_tickers_count".into(),
        FlatValue::Int(tickers.len() as i64),
    );
    out.insert(
        "portfolio_avg_hist_return".into(),
        float_or_null(stats::mean(&returns)),
    );
    out.insert(
        "portfolio_std_hist_return".into(),
        float_or_null(stats::pstdev(&returns)),
    );
    out.insert(
        "portfolio_max_hist_return".into(),
        float_or_null(returns.iter().copied().reduce(f64::max)),
    );
    out.insert(
        "portfolio_total_cost".into(),
        float_or_null((total_cost != 0.0).then_some(total_cost)),
    );
    for (sector, count) in sectors {
        out.insert(
            format!("portfolio_sector_{sector}_count"),
            FlatValue::Int(count),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aggregates_positions() {
        let rec = json!({"portfolio": [
            {"ticker": "AAA", "historical_return": 0.1, "quantity": 2, "price": 10.0, "sector": "Tech"},
            {"symbol": "BBB", "return_pct": "0.3", "cost": 5, "industry": "Energy"},
            {"ticker": "AAA", "qty": 0, "price": 1, "sector": "Tech"},
            "junk"
        ]});
        let f = portfolio_features(&rec);
        assert_eq!(f["portfolio_size"], FlatValue::Int(4));
        assert_eq!(f["portfolio_tickers_count"], FlatValue::Int(2));
        assert_eq!(f["portfolio_max_hist_return"], FlatValue::Float(0.3));
        let FlatValue::Float(avg) = f["portfolio_avg_hist_return"] else {
            panic!("avg missing")
        };
        assert!((avg - 0.2).abs() < 1e-12);
        // 2 * 10 + 5 + 1 * 1
        assert_eq!(f["portfolio_total_cost"], FlatValue::Float(26.0));
        assert_eq!(f["portfolio_sector_Tech_count"], FlatValue::Int(2));
        assert_eq!(f["portfolio_sector_Energy_count"], FlatValue::Int(1));
    }

    #[test]
    fn positions_without_numbers_yield_nulls() {
        let f = portfolio_features(&json!({"portfolio_items": [{"name": "X"}]}));
        assert_eq!(f["portfolio_tickers_count"], FlatValue::Int(1));
        assert_eq!(f["portfolio_avg_hist_return"], FlatValue::Null);
        assert_eq!(f["portfolio_total_cost"], FlatValue::Null);
    }

    #[test]
    fn empty_portfolio_falls_through_to_next_key() {
        let rec = json!({"portfolio": [], "portfolio_positions": [{"ticker": "Z"}]});
        assert_eq!(portfolio_features(&rec)["portfolio_size"], FlatValue::Int(1));
    }

    #[test]
    fn missing_or_non_list_portfolio_adds_nothing() {
        assert!(portfolio_features(&json!({"a": 1})).is_empty());
        assert!(portfolio_features(&json!({"portfolio": "AAA"})).is_empty());
    }
}
