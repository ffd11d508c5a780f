// Spreadsheet file reading (first sheet, first row is the header)

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};

use crate::constants::SPREADSHEET_EXTENSIONS;
use crate::error::{LoadbookError, Result};
use super::{CellValue, RowSource, SourceRow};

/// A spreadsheet on disk, read in full when the pipeline asks for rows.
#[derive(Debug, Clone)]
pub struct SpreadsheetFile {
    path: PathBuf,
}

impl SpreadsheetFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RowSource for SpreadsheetFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_rows(&self) -> Result<Vec<SourceRow>> {
        read_spreadsheet(&self.path)
    }
}

/// Parse the first sheet into header-keyed rows. Fully blank rows are dropped.
pub fn read_spreadsheet(path: &Path) -> Result<Vec<SourceRow>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        return Err(LoadbookError::Spreadsheet(format!(
            "Unsupported file type {:?}; expected one of {}",
            path.display().to_string(),
            SPREADSHEET_EXTENSIONS.join(", ")
        )));
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| LoadbookError::Spreadsheet(format!("Failed to open {}: {}", path.display(), e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| LoadbookError::Spreadsheet(format!("{} has no sheets", path.display())))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LoadbookError::Spreadsheet(format!("Failed to read sheet {}: {}", sheet_name, e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| header_text(c)).collect(),
        None => return Ok(Vec::new()),
    };

    let mut parsed = Vec::new();
    for cells in rows {
        let row: SourceRow = headers
            .iter()
            .zip(cells.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, cell)| (header.clone(), to_cell_value(cell)))
            .filter(|(_, value)| !value.is_blank())
            .collect();
        if !row.is_empty() {
            parsed.push(row);
        }
    }

    log::debug!("Read {} rows from {} ({})", parsed.len(), path.display(), sheet_name);
    Ok(parsed)
}

fn header_text(cell: &Data) -> String {
    match to_cell_value(cell) {
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) => n.to_string(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Empty => String::new(),
    }
}

fn to_cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Empty,
    }
}
