use crate::domain::constants::POINTS_COLUMN;
use crate::domain::models::{CommentAverage, IntervalRow, IntervalsReport};
use crate::services::records::TraceLine;
use crate::services::stats;
use crate::trace::{labeled_row, FlatRow, FlatValue};

pub const INTERVAL_HEADER: [&str; 5] = [
    "interval_index",
    "start_comment_event_idx",
    "end_comment_event_idx",
    "interval_mean",
    "n_records",
];

const INLINE_COMMENT: &str = "//inline";
const MAX_COMMENT_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Comment(String),
    Record(f64),
}

/// A record carries its own comment when a `comment(s)` field is set or
/// any text value has a line starting with `//`.
pub fn has_inline_comment(row: &FlatRow) -> bool {
    row.iter().any(|(key, value)| {
        let tail = key.rsplit('.').next().unwrap_or(key).to_lowercase();
        let named = (tail.ends_with("comment") || tail.ends_with("comments")) && !value.is_blank();
        let marked = value
            .as_text()
            .map(|s| s.lines().any(|l| l.trim().starts_with("//")))
            .unwrap_or(false);
        named || marked
    })
}

/// Build the event stream. Records without a numeric label are skipped.
pub fn events(lines: &[TraceLine]) -> Vec<Event> {
    let mut out = Vec::new();
    for line in lines {
        match line {
            TraceLine::Comment(text) => out.push(Event::Comment(text.clone())),
            TraceLine::Record(record) => {
                let Some(row) = labeled_row(record) else {
                    continue;
                };
                let Some(points) = row.get(POINTS_COLUMN).and_then(FlatValue::as_f64) else {
                    continue;
                };
                out.push(Event::Record(points));
                if has_inline_comment(&row) {
                    out.push(Event::Comment(INLINE_COMMENT.to_string()));
                }
            }
        }
    }
    out
}

fn records_between(events: &[Event], start: usize, end: usize) -> Vec<f64> {
    events[start + 1..end]
        .iter()
        .filter_map(|e| match e {
            Event::Record(p) => Some(*p),
            Event::Comment(_) => None,
        })
        .collect()
}

fn shorten(text: &str) -> String {
    let s = text.trim();
    if s.chars().count() > MAX_COMMENT_CHARS {
        let head: String = s.chars().take(MAX_COMMENT_CHARS - 3).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

pub struct IntervalAnalysis {
    pub report: IntervalsReport,
    pub intervals: Vec<IntervalRow>,
}

pub fn analyze(input: &str, events: &[Event]) -> IntervalAnalysis {
    let points: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            Event::Record(p) => Some(*p),
            Event::Comment(_) => None,
        })
        .collect();
    let comment_idxs: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Comment(_)))
        .map(|(i, _)| i)
        .collect();

    let following: Vec<f64> = comment_idxs
        .iter()
        .filter_map(|&ci| {
            events[ci + 1..].iter().find_map(|e| match e {
                Event::Record(p) => Some(*p),
                Event::Comment(_) => None,
            })
        })
        .collect();

    let intervals: Vec<IntervalRow> = comment_idxs
        .windows(2)
        .enumerate()
        .filter_map(|(idx, pair)| {
            let between = records_between(events, pair[0], pair[1]);
            stats::mean(&between).map(|m| IntervalRow {
                interval_index: idx,
                start_comment_event_idx: pair[0],
                end_comment_event_idx: pair[1],
                interval_mean: m,
                n_records: between.len(),
            })
        })
        .collect();
    let interval_means: Vec<f64> = intervals.iter().map(|r| r.interval_mean).collect();

    let comments = comment_idxs
        .iter()
        .enumerate()
        .map(|(idx, &ci)| {
            let next = comment_idxs.get(idx + 1).copied().unwrap_or(events.len());
            let text = match &events[ci] {
                Event::Comment(t) => shorten(t),
                Event::Record(_) => String::new(),
            };
            CommentAverage {
                comment: text,
                mean: stats::mean(&records_between(events, ci, next)),
            }
        })
        .collect();

    IntervalAnalysis {
        report: IntervalsReport {
            input: input.to_string(),
            records: points.len(),
            overall_mean: stats::mean(&points),
            mean_following_comments: stats::mean(&following),
            following_count: following.len(),
            mean_between_comments: stats::mean(&interval_means),
            interval_count: intervals.len(),
            comments,
        },
        intervals,
    }
}

fn fmt_mean(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// `<comment>: <mean|NaN>` lines.
pub fn comment_lines(comments: &[CommentAverage]) -> Vec<String> {
    comments
        .iter()
        .map(|c| {
            let mean = c.mean.map(fmt_mean).unwrap_or_else(|| "NaN".to_string());
            format!("{}: {}", c.comment, mean)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> TraceLine {
        TraceLine::Record(v)
    }

    fn comment(s: &str) -> TraceLine {
        TraceLine::Comment(s.to_string())
    }

    #[test]
    fn inline_markers_add_a_comment_after_the_record() {
        let lines = vec![
            rec(json!({"points": 5, "note": "ok\n// tweak budget"})),
            rec(json!({"points": 7, "meta": {"Comments": "second"}})),
            rec(json!({"points": 9, "comment": ""})),
        ];
        assert_eq!(
            events(&lines),
            vec![
                Event::Record(5.0),
                Event::Comment(INLINE_COMMENT.into()),
                Event::Record(7.0),
                Event::Comment(INLINE_COMMENT.into()),
                Event::Record(9.0),
            ]
        );
    }

    #[test]
    fn unlabeled_and_non_numeric_records_are_skipped() {
        let lines = vec![rec(json!({"a": 1})), rec(json!({"points": "n/a"}))];
        assert!(events(&lines).is_empty());
    }

    #[test]
    fn interval_statistics() {
        // C R(10) R(20) C C R(40) C R(1)
        let ev = vec![
            Event::Comment("// a".into()),
            Event::Record(10.0),
            Event::Record(20.0),
            Event::Comment("// b".into()),
            Event::Comment("// c".into()),
            Event::Record(40.0),
            Event::Comment("// d".into()),
            Event::Record(1.0),
        ];
        let a = analyze("t.jsonl", &ev);
        assert_eq!(a.report.records, 4);
        assert_eq!(a.report.overall_mean, Some(71.0 / 4.0));
        // after a: 10, after b: 40, after c: 40, after d: 1
        assert_eq!(a.report.following_count, 4);
        assert_eq!(a.report.mean_following_comments, Some(91.0 / 4.0));
        assert_eq!(
            a.intervals,
            vec![
                IntervalRow {
                    interval_index: 0,
                    start_comment_event_idx: 0,
                    end_comment_event_idx: 3,
                    interval_mean: 15.0,
                    n_records: 2
                },
                IntervalRow {
                    interval_index: 2,
                    start_comment_event_idx: 4,
                    end_comment_event_idx: 6,
                    interval_mean: 40.0,
                    n_records: 1
                },
            ]
        );
        assert_eq!(a.report.mean_between_comments, Some(27.5));
        assert_eq!(
            comment_lines(&a.report.comments),
            vec!["// a: 15.0", "// b: NaN", "// c: 40.0", "// d: 1.0"]
        );
    }

    #[test]
    fn long_comments_are_truncated() {
        let long = format!("// {}", "x".repeat(200));
        let s = shorten(&long);
        assert_eq!(s.chars().count(), 120);
        assert!(s.ends_with("..."));
    }

    #[test]
    fn no_comments_means_no_intervals() {
        let a = analyze("t", &[Event::Record(3.0)]);
        assert_eq!(a.report.mean_following_comments, None);
        assert_eq!(a.report.mean_between_comments, None);
        assert!(a.intervals.is_empty());
    }
}
