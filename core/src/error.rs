use crate::types::MccCode;
use thiserror::Error;

/// Fatal failures. A rejected attack is never an error; it is a
/// `Verdict::Violated` / `Ok(false)`.
#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("Cannot open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Shape mismatch: source has {source_rows} rows, attack has {attack_rows}")]
    ShapeMismatch {
        source_rows: usize,
        attack_rows: usize,
    },

    #[error("Malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    #[error("Unparseable timestamp at row {row}: '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("Malformed quantile table: {0}")]
    MalformedQuantiles(String),

    #[error("MCC code {mcc_code} has no {bucket} range in the quantile table")]
    UnknownCategory {
        mcc_code: MccCode,
        bucket: &'static str,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BudgetError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        BudgetError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type BudgetResult<T> = Result<T, BudgetError>;
