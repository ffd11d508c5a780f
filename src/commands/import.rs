// Loadbook - Import Commands
// Spreadsheet import, preview, replace and import status

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::db::query::{count_matching, LoadFilters};
use crate::db::schema::Source;
use crate::error::Result;
use crate::import::{self, ImportSummary, Preview, ReplaceSummary, SpreadsheetFile};
use super::LoadBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatus {
    pub has_imported_loads: bool,
    pub imported_count: i64,
}

impl LoadBook {
    /// Best-effort import. Row failures and an unreadable file are reported in
    /// the summary.
    pub fn import_from_spreadsheet(&self, path: &Path, default_source: &Source) -> Result<ImportSummary> {
        let file = SpreadsheetFile::new(path);
        Ok(import::import_from_source(&self.conn, &file, default_source))
    }

    pub fn preview_spreadsheet(&self, path: &Path, limit: usize) -> Result<Preview> {
        import::preview_source(&SpreadsheetFile::new(path), limit)
    }

    /// Swap every imported load for the contents of the spreadsheet, atomically.
    pub fn replace_imported_data(&mut self, path: &Path) -> Result<ReplaceSummary> {
        let file = SpreadsheetFile::new(path);
        import::replace_imported_data(&mut self.conn, &file)
    }

    pub fn import_status(&self) -> Result<ImportStatus> {
        let imported_count = count_matching(&self.conn, &LoadFilters::imported())?;
        Ok(ImportStatus {
            has_imported_loads: imported_count > 0,
            imported_count,
        })
    }
}
