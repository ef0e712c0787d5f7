use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum StudyError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("no input files found; pass JSON or JSONL files as arguments")]
    NoInput,
    #[error("no usable records found in {0}")]
    NoRecords(String),
    #[error("no numeric features found in {0}")]
    NoFeatures(String),
    #[error("missing column: {0}")]
    MissingColumn(String),
    #[error("need at least {needed} rows, found {found}")]
    NotEnoughRows { needed: usize, found: usize },
    #[error("invalid surrogate model: {0}")]
    InvalidModel(String),
}

impl StudyError {
    pub fn code(&self) -> &'static str {
        match self {
            StudyError::InputNotFound(_) => "INPUT_NOT_FOUND",
            StudyError::NoInput => "NO_INPUT",
            StudyError::NoRecords(_) => "NO_RECORDS",
            StudyError::NoFeatures(_) => "NO_FEATURES",
            StudyError::MissingColumn(_) => "MISSING_COLUMN",
            StudyError::NotEnoughRows { .. } => "NOT_ENOUGH_ROWS",
            StudyError::InvalidModel(_) => "INVALID_MODEL",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            StudyError::InputNotFound(_) | StudyError::NoInput => 2,
            _ => 1,
        }
    }
}
