use thiserror::Error;

/// Errors that abort an analysis. Problems with individual metrics are not
/// errors; they show up as `unevaluable` verdicts inside the report.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Not a readable PDF document: {0}")]
    Format(String),

    #[error("Document loading exceeded the {limit_ms}ms limit")]
    Timeout { limit_ms: u64 },

    #[error("Invalid rule set: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
