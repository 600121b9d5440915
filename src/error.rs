use chrono::NaiveDate;
use thiserror::Error;

/// Result alias used throughout the dashboard library.
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Errors raised while ingesting uploads, deriving the merged table or
/// rendering its outputs.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV file is empty")]
    EmptyTable,

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("column header '{header}' is not a M/D/YY date")]
    InvalidDateHeader { header: String },

    #[error("date column '{header}' appears more than once")]
    DuplicateDate { header: String },

    #[error("row {row}, column '{column}': '{value}' is not a count")]
    InvalidCount {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: '{value}' is not a coordinate")]
    InvalidCoordinate { row: usize, value: String },

    #[error("{quantity} on {date} does not fit in a 64-bit count")]
    CountOverflow { quantity: String, date: NaiveDate },

    #[error("'{filename}' was rejected: only .csv files can be uploaded")]
    UnsupportedUpload { filename: String },

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("export failed: {0}")]
    Export(String),
}
