// Loadbook Error Types

use thiserror::Error;

use crate::import::RowError;

#[derive(Error, Debug)]
pub enum LoadbookError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Column \"{0}\" is not allowed for distinct values query")]
    ColumnNotAllowed(String),

    /// The delete phase removed a different number of rows than it counted.
    #[error("Delete count mismatch: expected {expected}, got {actual}")]
    DeleteCountMismatch { expected: usize, actual: usize },

    #[error("Import failed after delete; the {deleted} deleted loads were restored by rollback ({} error(s))", errors.len())]
    ImportFailedAfterDelete { deleted: usize, errors: Vec<RowError> },

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for LoadbookError {
    fn from(err: anyhow::Error) -> Self {
        LoadbookError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoadbookError>;
