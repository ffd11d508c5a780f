// Loadbook - Library Entry Point
// Reloading load records: store, query builder, spreadsheet import and replace

pub mod constants;
pub mod error;
pub mod config;
pub mod db;
pub mod import;
pub mod commands;

pub use commands::{ImportStatus, LoadBook};
pub use config::AppConfig;
pub use db::query::{LoadFilters, LoadPage, Pagination};
pub use db::schema::{FieldValue, FilterOptions, Load, LoadInput, Source};
pub use error::{LoadbookError, Result};
pub use import::{ImportSummary, Preview, ReplaceSummary, RowError, RowRef};
