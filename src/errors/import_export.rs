use std::fmt;

use thiserror::Error;

use super::MaterialError;

/// A problem with one CSV data row. `line` is 1-based and counts the header.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Error, Debug)]
pub enum ImportExportError {
    #[error("No file was uploaded")]
    MissingFile,

    #[error("Uploaded file is not valid UTF-8")]
    Encoding,

    /// The dry run rejected at least one row; nothing was written
    #[error("{} row(s) failed validation", .0.len())]
    RowErrors(Vec<RowError>),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl ImportExportError {
    pub fn row_errors(&self) -> &[RowError] {
        match self {
            ImportExportError::RowErrors(errors) => errors,
            _ => &[],
        }
    }
}
