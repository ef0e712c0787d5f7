use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch working directory seeded with a small evaluator trace and
/// the stock/points side files the estimator reads.
pub struct TestEnv {
    tmp: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        write_fixture_trace(tmp.path());
        write_side_files(tmp.path());
        Self { tmp }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.tmp.path().join(name)
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap_or_else(|e| panic!("read {name}: {e}"))
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("tracestudy");
        cmd.current_dir(self.tmp.path()).env("RUST_LOG", "off");
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let mut cmd = self.cmd();
        let out = cmd
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }
}

fn entry(ts: &str, name: &str, budget: i64, years: (i64, i64), risk: &str) -> Value {
    json!({
        "ts": ts,
        "parsed_profile": {
            "name": name,
            "budget": budget,
            "start_year": years.0,
            "end_year": years.1,
            "risk_tolerance": risk
        }
    })
}

fn with(mut base: Value, extra: Value) -> Value {
    if let (Some(b), Some(e)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in e {
            b.insert(k.clone(), v.clone());
        }
    }
    base
}

fn ok_result(points: i64) -> Value {
    json!({"result": {"ok": true, "response": format!("{{\"points\": {points}}}")}})
}

/// Six entries between two comment lines plus one garbage line:
/// t1, t2, t6 scored (120, 40, 300), t3 over budget, t4 failed,
/// t5 skipped with no result.
fn write_fixture_trace(base: &Path) {
    let t1 = with(
        entry("t1", "Ann", 1000, (2010, 2020), "Conservative"),
        json!({
            "eligible_count": 40,
            "portfolio": [
                {"ticker": "AAA", "quantity": 2, "price": 10, "sector": "Tech"},
                {"ticker": "BBB", "quantity": 1, "price": 6, "sector": "Energy"}
            ]
        }),
    );
    let t2 = with(
        entry("t2", "Bo", 5000, (2015, 2020), "Moderate"),
        json!({
            "eligible_count": 80,
            "portfolio": [{"ticker": "AAA", "quantity": 1, "price": 11, "sector": "Tech"}]
        }),
    );
    let t3 = with(
        entry("t3", "Cy", 200, (2018, 2020), "Aggressive"),
        json!({
            "eligible_count": 10,
            "result": {"ok": false, "error": "budget breached: would exceed budget by $50"}
        }),
    );
    let t4 = with(
        entry("t4", "Di", 3000, (2000, 2020), "Moderate"),
        json!({
            "eligible_count": 60,
            "result": {"ok": false, "error": "timeout contacting evaluator"}
        }),
    );
    let t5 = with(
        entry("t5", "Ed", 700, (2012, 2020), "Moderate"),
        json!({"eligible_count": 5, "skipped": true}),
    );
    let t6 = with(
        entry("t6", "Fay", 20000, (2005, 2020), "Aggressive"),
        json!({
            "eligible_count": 150,
            "portfolio": [
                {"ticker": "CCC", "quantity": 3, "price": 40, "sector": "Health"},
                {"ticker": "BBB", "quantity": 2, "price": 7, "sector": "Energy"}
            ]
        }),
    );

    let lines = [
        "// session start".to_string(),
        with(t1, ok_result(120)).to_string(),
        with(t2, ok_result(40)).to_string(),
        t3.to_string(),
        "// retry with bigger budget".to_string(),
        t4.to_string(),
        t5.to_string(),
        "not json at all".to_string(),
        with(t6, ok_result(300)).to_string(),
    ];
    fs::write(base.join("request_trace.jsonl"), lines.join("\n") + "\n").expect("write trace");
}

fn write_side_files(base: &Path) {
    let stocks = json!({
        "stocks": [
            {"ticker": "AAA", "volatility": 0.2, "market_cap": 1_000_000.0},
            {"ticker": "BBB", "volatility": 0.4, "market_cap": 100.0}
        ]
    });
    fs::write(
        base.join("stocks_cache.json"),
        serde_json::to_string_pretty(&stocks).expect("serialize stocks cache"),
    )
    .expect("write stocks cache");
    let points = json!({"scores": {"AAA": {"low": 1, "medium": 3, "high": "x"}}});
    fs::write(base.join("points_store.json"), points.to_string()).expect("write points store");
}
