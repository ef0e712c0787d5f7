/// Canonical column holding the points label of a flattened row.
pub const POINTS_COLUMN: &str = "__points__";

/// Penalty for requests the evaluator rejected for going over budget.
pub const BUDGET_BREACH_PENALTY: i64 = -2000;
/// Penalty for any other failed evaluator call.
pub const ERROR_PENALTY: i64 = -400;

pub const DEFAULT_CONFIG_FILE: &str = "tracestudy.toml";

pub const DEFAULT_TRACE_FILES: [&str; 4] = [
    "request_trace.jsonl",
    "overbudget_events.jsonl",
    "stocks_cache_monthly.json",
    "stocks_cache.json",
];

pub const DEFAULT_STOCKS_CACHE: &str = "stocks_cache.json";
pub const DEFAULT_POINTS_STORE: &str = "points_store.json";

/// Preferred target columns for importance analysis, in order.
pub const TARGET_CANDIDATES: [&str; 3] = [POINTS_COLUMN, "result.response.points", "points"];

/// Feature order of the linear surrogate; persisted with the model.
pub const SURROGATE_FEATURES: [&str; 10] = [
    "budget_log",
    "eligible",
    "period",
    "avg_vol",
    "avg_logcap",
    "avg_pt",
    "psize",
    "risk_cons",
    "risk_mod",
    "risk_aggr",
];
