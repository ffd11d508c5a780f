// Spreadsheet import module

pub mod mapper;
pub mod pipeline;
pub mod replace;
pub mod spreadsheet;

use std::collections::HashMap;

use serde::{Serialize, Serializer};

use crate::error::Result;

pub use pipeline::{import_from_source, import_rows, preview_rows, preview_source, Preview};
pub use replace::{replace_imported_data, ReplaceCounts, ReplaceSummary};
pub use spreadsheet::SpreadsheetFile;

/// Raw value of one spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => !n.is_finite(),
            CellValue::Bool(_) => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// One data row keyed by its (localized) column header.
pub type SourceRow = HashMap<String, CellValue>;

/// Anything that can hand the pipeline a complete set of rows.
pub trait RowSource {
    /// Human-readable origin for log lines.
    fn describe(&self) -> String;

    fn read_rows(&self) -> Result<Vec<SourceRow>>;
}

impl RowSource for Vec<SourceRow> {
    fn describe(&self) -> String {
        format!("{} in-memory rows", self.len())
    }

    fn read_rows(&self) -> Result<Vec<SourceRow>> {
        Ok(self.clone())
    }
}

/// Which row an import error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRef {
    /// Spreadsheet line number (the header is line 1).
    Line(usize),
    /// The run failed before any row could be processed.
    General,
}

impl Serialize for RowRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            RowRef::Line(n) => serializer.serialize_u64(*n as u64),
            RowRef::General => serializer.serialize_str("general"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: RowRef,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub success: bool,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
