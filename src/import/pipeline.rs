// Row import pipeline: skip, map, label, insert

use rusqlite::Connection;
use serde::Serialize;

use crate::constants::HEADER_ROW_OFFSET;
use crate::db::schema::{insert_load, LoadInput, Source};
use crate::error::Result;
use super::mapper::{has_required_field, map_row};
use super::{ImportSummary, RowError, RowRef, RowSource, SourceRow};

/// Mapped rows shown before committing to an import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub total: usize,
    pub preview: Vec<LoadInput>,
}

/// Map a row and settle its provenance. Spreadsheet rows never become user data.
fn labelled_input(row: &SourceRow, line: usize, default_source: &Source) -> LoadInput {
    let mut input = map_row(row);
    input.source = match input.source.take() {
        Some(label) if label.is_user() => {
            log::warn!(
                "Row {} claims source \"user\"; stored as \"{}\" instead",
                line,
                default_source
            );
            Some(default_source.clone())
        }
        Some(label) => Some(label),
        None => Some(default_source.clone()),
    };
    input
}

/// Insert every row with a caliber. Failures are collected per row; the run
/// always continues and is never wrapped in a transaction here.
pub fn import_rows(conn: &Connection, rows: &[SourceRow], default_source: &Source) -> ImportSummary {
    let mut summary = ImportSummary {
        success: true,
        ..Default::default()
    };

    for (index, row) in rows.iter().enumerate() {
        let line = index + HEADER_ROW_OFFSET;

        if !has_required_field(row) {
            summary.skipped += 1;
            continue;
        }

        let input = labelled_input(row, line, default_source);
        match insert_load(conn, &input) {
            Ok(_) => summary.imported += 1,
            Err(e) => {
                log::warn!("Row {} rejected: {}", line, e);
                summary.errors.push(RowError {
                    row: RowRef::Line(line),
                    error: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "Imported {} of {} rows ({} skipped, {} failed)",
        summary.imported,
        rows.len(),
        summary.skipped,
        summary.errors.len()
    );
    summary
}

/// Read the whole source, then import it. A read failure is reported in the
/// summary rather than returned as an error.
pub fn import_from_source(conn: &Connection, source: &dyn RowSource, default_source: &Source) -> ImportSummary {
    match source.read_rows() {
        Ok(rows) => import_rows(conn, &rows, default_source),
        Err(e) => {
            log::error!("Failed to read {}: {}", source.describe(), e);
            ImportSummary {
                success: false,
                imported: 0,
                skipped: 0,
                errors: vec![RowError {
                    row: RowRef::General,
                    error: e.to_string(),
                }],
            }
        }
    }
}

/// Map the first `limit` rows without writing anything.
pub fn preview_rows(rows: &[SourceRow], limit: usize) -> Preview {
    let default_source = Source::imported();
    let preview = rows
        .iter()
        .take(limit)
        .enumerate()
        .map(|(index, row)| labelled_input(row, index + HEADER_ROW_OFFSET, &default_source))
        .collect();

    Preview {
        total: rows.len(),
        preview,
    }
}

pub fn preview_source(source: &dyn RowSource, limit: usize) -> Result<Preview> {
    let rows = source.read_rows()?;
    Ok(preview_rows(&rows, limit))
}
