use crate::domain::errors::StudyError;
use crate::domain::models::{ErrorBody, ErrorOut, JsonOut};
use serde::Serialize;

/// Text mode prints whatever lines `lines` renders.
pub fn print_one<T: Serialize>(
    json: bool,
    data: T,
    lines: impl Fn(&T) -> Vec<String>,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        for line in lines(&data) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Stable code and process exit status for a failed run.
pub fn classify(err: &anyhow::Error) -> (&'static str, i32) {
    match err.downcast_ref::<StudyError>() {
        Some(e) => (e.code(), e.exit_code()),
        None => ("INTERNAL", 1),
    }
}

pub fn print_error(json: bool, err: &anyhow::Error) -> i32 {
    let (code, exit) = classify(err);
    if json {
        let out = ErrorOut {
            ok: false,
            error: ErrorBody {
                code: code.to_string(),
                message: format!("{err:#}"),
            },
        };
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{s}"),
            Err(_) => eprintln!("error: {err:#}"),
        }
    } else {
        eprintln!("error: {err:#}");
    }
    exit
}

/// `-` for absent statistics in text output.
pub fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn study_errors_keep_their_code_and_exit_status() {
        let err = anyhow::Error::new(StudyError::NoInput);
        assert_eq!(classify(&err), ("NO_INPUT", 2));
        let err = anyhow::anyhow!("disk on fire");
        assert_eq!(classify(&err), ("INTERNAL", 1));
    }

    #[test]
    fn optional_values_render_compactly() {
        assert_eq!(fmt_opt(Some(0.5)), "0.5000");
        assert_eq!(fmt_opt(None), "-");
    }
}
