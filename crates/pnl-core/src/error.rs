use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the P&L normalization and aggregation core.
#[derive(Error, Debug)]
pub enum PnlError {
    /// A single row or field could not be interpreted. Ingestion skips the
    /// row and records it; this never aborts a whole file.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The accounting header row, the date-range line, or any other
    /// structural marker needed to attribute a file to a month is missing.
    #[error("Missing header: {0}")]
    MissingHeader(String),

    /// An aggregation range references a month that is not in the month list
    /// or is otherwise unusable.
    #[error("Invalid range {start} to {end}: {reason}")]
    InvalidRange {
        start: String,
        end: String,
        reason: String,
    },

    /// A month key string is neither `"Month YYYY"` nor `"YYYY-MM"`.
    #[error("Invalid month key: {0}")]
    InvalidMonthKey(String),

    /// The file extension does not map to a known export type.
    #[error("Unsupported export file: {0}")]
    UnsupportedFile(PathBuf),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A spreadsheet workbook could not be opened or has no usable sheet.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PnlError {
    /// Shorthand for building an [`PnlError::InvalidRange`].
    pub fn invalid_range(
        start: impl ToString,
        end: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PnlError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the P&L crates.
pub type Result<T> = std::result::Result<T, PnlError>;
