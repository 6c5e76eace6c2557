use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV must have headers '{expected}', got: {got}")]
    Headers { expected: &'static str, got: String },
    #[error("line {line}: invalid timestamp '{value}'")]
    Timestamp { line: u64, value: String },
    #[error("line {line}: {reason}")]
    Row { line: u64, reason: String },
}

pub type Result<T> = std::result::Result<T, SourceError>;
