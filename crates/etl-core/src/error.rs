use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the creative analytics pipeline.
///
/// Every variant is structural: per-row data-quality problems never surface
/// here, they are absorbed as missing values inside the tables.
#[derive(Error, Debug)]
pub enum EtlError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured input directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// One of the four logical source sheets could not be located.
    #[error("Source sheet not found: {0}")]
    MissingSource(String),

    /// A column the pipeline needs to reference is absent from a table.
    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A date cell could not be parsed under the strict date policy.
    #[error("Unparsable date in {table}.{column} at row {row}: {value:?}")]
    DateParse {
        table: String,
        column: String,
        row: usize,
        value: String,
    },

    /// A CSV record has more fields than its header row.
    #[error("Malformed record in {path} at line {line}: {found} fields, header has {expected}")]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A CSV document could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The relational sink rejected a statement.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Run metadata could not be serialized.
    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

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

impl EtlError {
    /// Shorthand for [`EtlError::MissingColumn`].
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        EtlError::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Convenience alias used throughout the ETL crates.
pub type Result<T> = std::result::Result<T, EtlError>;
